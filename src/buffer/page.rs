use std::ops::Deref;
use std::sync::RwLock;

use crate::wal::Lsn;

pub type PageId = i64;

pub type FrameId = usize;

/// Size of a data page in byte.
pub const PAGE_SIZE: usize = 4096;

/// Invalid page id, marks a frame that holds no page.
pub const INVALID_PAGE_ID: PageId = -1;

/// The actual page data that include in-memory metadata
/// like dirty bit and pin count etc. and the data on storage.
pub struct PageData {
    pub id: PageId,
    /// Page image, always exactly PAGE_SIZE bytes long.
    pub data: Vec<u8>,
    pub is_dirty: bool,
    pub pin_count: i32,
    /// Recovery lsn of the newest update to this page. The buffer pool
    /// flushes the log up to this lsn before the page image goes to disk.
    pub lsn: Lsn,
}

impl PageData {
    fn new() -> Self {
        Self {
            id: INVALID_PAGE_ID,
            data: vec![0; PAGE_SIZE],
            is_dirty: false,
            pin_count: 0,
            lsn: 0,
        }
    }

    /// Reset the frame to the empty state: zero the buffer and
    /// clear all metadata.
    pub fn clear(&mut self) {
        self.id = INVALID_PAGE_ID;
        self.is_dirty = false;
        self.pin_count = 0;
        self.lsn = 0;
        self.data.fill(0);
    }
}

/// Page act as the container of the actual page data for
/// providing concurrent access protection.
pub struct Page {
    inner: RwLock<PageData>,
}

impl Page {
    /// Allocate a page in memory with the given PAGE_SIZE and init
    /// the metadata accordingly.
    pub fn new() -> Self {
        Page { inner: RwLock::new(PageData::new()) }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new()
    }
}

impl Deref for Page {
    type Target = RwLock<PageData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
