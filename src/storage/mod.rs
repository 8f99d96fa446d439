use std::fmt::Debug;
use std::path::Path;

use serde::Deserialize;

use crate::buffer::page::PageId;
use crate::error::{Error, Result};

pub mod file;
pub mod memory;

/// A page store addressed by page id, where every page is a fixed PAGE_SIZE
/// byte block at offset page_id * PAGE_SIZE. The buffer pool moves page
/// images back and forth through this interface and never bypasses it.
///
/// The DiskManager trait is designed as `trait object` compatible, i.e., follow
/// the [object safety rules](https://doc.rust-lang.org/reference/items/traits.html#object-safety)
/// so the buffer pool can hold any implementation behind a Box.
pub trait DiskManager: Debug + Send + Sync {
    /// Read the page with the given id into buf. A page that has never been
    /// written reads back as all zeroes.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()>;

    /// Write the page image under the given id, overwriting any previous
    /// image. The buffer must be exactly PAGE_SIZE bytes long.
    fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()>;

    /// Durability barrier: block until previously written pages reach the
    /// underlying medium.
    fn sync(&self) -> Result<()>;
}

#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub enum StorageType {
    Memory,
    File,
}

pub fn new_disk_manager(typ: StorageType, path: Option<&Path>) -> Result<Box<dyn DiskManager>> {
    match typ {
        StorageType::Memory => Ok(Box::new(memory::Memory::new())),
        StorageType::File => {
            let path =
                path.ok_or_else(|| Error::value("file storage requires a path"))?;
            Ok(Box::new(file::File::open(path)?))
        }
    }
}
