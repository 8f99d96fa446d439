use std::collections::BTreeMap;

use crate::buffer::page::{PageId, PAGE_SIZE};
use crate::error::{Error, Result};

use super::DiskManager;

/// An in-memory page store, useful for testing and ephemeral pools.
#[derive(Debug)]
pub struct Memory {
    pages: BTreeMap<PageId, Vec<u8>>,
}

impl Memory {
    pub fn new() -> Memory {
        Memory { pages: BTreeMap::new() }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

impl DiskManager for Memory {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        if buf.len() != PAGE_SIZE {
            return Err(Error::value(format!(
                "page buffer is {} bytes, want {}",
                buf.len(),
                PAGE_SIZE
            )));
        }
        match self.pages.get(&page_id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        if data.len() != PAGE_SIZE {
            return Err(Error::value(format!(
                "page image is {} bytes, want {}",
                data.len(),
                PAGE_SIZE
            )));
        }
        self.pages.insert(page_id, data.to_vec());
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
