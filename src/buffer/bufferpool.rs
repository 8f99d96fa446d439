use std::path::Path;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::config::Config;
use crate::container::hash::ExtendibleHashTable;
use crate::error::{Error, Result};
use crate::storage::{new_disk_manager, DiskManager};
use crate::wal::LogManager;

use super::page::{FrameId, Page, PageData, PageId, INVALID_PAGE_ID};
use super::replacer::Replacer;
use super::replacer::SyncLRUKReplacer;

/// The buffer pool is responsible for moving physical pages back and forth
/// from main memory to disk. It allows a DBMS to support databases that are
/// larger than the amount of memory available to the system.
///
/// The buffer pool's operations are transparent to other parts in the system.
/// For example, the system asks the buffer pool for a page using its unique
/// identifier (page_id) and it does not know whether that page is already in
/// memory or whether the system has to retrieve it from disk.
struct BufferPool {
    pool_size: usize,
    /// Page store backing the pool.
    disk: Box<dyn DiskManager>,
    /// Write-ahead log hook. When present, the log is flushed up to a page's
    /// lsn before that page's image is written to disk.
    log: Option<Arc<dyn LogManager>>,
    /// array of buffer pool pages. use the array index as
    /// FrameId, i.e., the FrameId is in range: [0, pool_size).
    pages: Vec<Arc<Page>>,
    /// page table for keeping track of buffer pool pages, maps a resident
    /// page id to the frame holding it.
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// list of free frames that don't have any pages on them.
    free_list: Vec<FrameId>,
    /// Replacer to find unpinned pages for replacement.
    replacer: Arc<dyn Replacer>,
    /// The next page id to be allocated.
    /// TODO: persist this info later.
    next_page_id: PageId,
}

impl BufferPool {
    fn new(
        disk: Box<dyn DiskManager>,
        log: Option<Arc<dyn LogManager>>,
        pool_size: usize,
        replacer_k: usize,
        bucket_size: usize,
    ) -> Self {
        let mut pages = Vec::with_capacity(pool_size);
        let mut free_list = Vec::with_capacity(pool_size);
        let page_table = ExtendibleHashTable::new(bucket_size);
        let replacer: Arc<dyn Replacer> = Arc::new(SyncLRUKReplacer::new(replacer_k, pool_size));
        for i in 0..pool_size {
            pages.push(Arc::new(Page::new()));
            // initially, every page is in the free list
            free_list.push(i);
        }
        BufferPool { pool_size, disk, log, pages, page_table, free_list, replacer, next_page_id: 0 }
    }

    /// Create a new page in the buffer pool, return the newly created page or
    /// an error if all frames are currently in use and not evictable(in
    /// another word, pinned).
    ///
    /// Pick the replacement frame from either the free list or the replacer(always find from
    /// the free list first), and then call allocate_page to get a new page id. If the replacement
    /// frame has a dirty page, write it back to the disk first. reset the memory and metadata
    /// for the new page.
    ///
    /// Remember to "pin" the frame by calling replacer.set_evictable(frame_id, false) so that
    /// the replacer wouldn't evict the frame before the buffer pool manager "unpin" it.
    fn new_page(&mut self) -> Result<Arc<Page>> {
        let frame_id = match self.acquire_frame() {
            Some(frame_id) => frame_id,
            None => return Err(Error::BufferPoolNoAvailableFrame),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;

        // write back the victim page, if any, and zero the frame
        self.reset_frame(&mut guard)?;

        let page_id = self.allocate_page();
        guard.id = page_id;
        // pin the new page with initial value 1
        guard.pin_count = 1;
        // link the new page with frame into page table
        self.page_table.insert(page_id, frame_id);
        // record frame access
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        drop(guard);
        Ok(page)
    }

    /// Fetch the requested page with the given page id from the buffer pool.
    /// return no available frame error if the page need to be fetched from
    /// disk but all frames are currently in use and not evictable(in other
    /// words, pinned).
    ///
    /// First search for page_id in the buffer pool. if not found, pick a replacement from
    /// either the free list or the replacer(always find from the free list first), read the
    /// page from the disk and replace the old page in the frame. similar to the new_page,
    /// if the old page is dirty, write it back to the disk and update the metadata
    /// of the new page.
    fn fetch_page(&mut self, page_id: PageId) -> Result<Arc<Page>> {
        // check if page table has the page id
        if let Some(frame_id) = self.page_table.find(&page_id) {
            // we have the page frame in buffer pool already,
            // increase pin count, record frame access then
            // return it.
            let page = Arc::clone(&self.pages[frame_id]);
            let mut guard = page.write()?;
            guard.pin_count += 1;
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);

            drop(guard);
            return Ok(page);
        }

        // page not found, pick a replacement from the free list or the
        // replacer. if neither has an available frame, return with
        // Error::BufferPoolNoAvailableFrame.
        let frame_id = match self.acquire_frame() {
            Some(frame_id) => frame_id,
            None => return Err(Error::BufferPoolNoAvailableFrame),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;

        // write back the victim page, if any, and zero the frame
        self.reset_frame(&mut guard)?;

        // fetch the page image from disk onto the frame
        self.disk.read_page(page_id, &mut guard.data)?;
        guard.id = page_id;
        guard.pin_count = 1;
        // link the new page with frame into page table
        self.page_table.insert(page_id, frame_id);
        // record frame access
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        drop(guard);
        Ok(page)
    }

    /// Flush the target page to disk regardless of the dirty flag.
    /// unset the dirty flag of the page after flushing.
    ///
    /// Return false if the page cannot be found in the page table,
    /// true otherwise.
    fn flush_page(&mut self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Ok(false);
        }
        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return Ok(false),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        self.flush_frame(&mut guard)?;

        Ok(true)
    }

    /// Flush all the resident pages in the buffer pool to disk, ending with
    /// a durability barrier on the disk manager.
    fn flush_all_pages(&mut self) -> Result<()> {
        for i in 0..self.pool_size {
            let page = Arc::clone(&self.pages[i]);
            let mut guard = page.write()?;
            if guard.id == INVALID_PAGE_ID {
                continue;
            }
            self.flush_frame(&mut guard)?;
        }
        self.disk.sync()
    }

    /// Delete a page from buffer pool. if a page is not in the buffer pool,
    /// it is vacuously deleted and the call returns true. if the page is
    /// pinned and cannot be deleted, return false immediately.
    ///
    /// After deleting the page from the page table, stop tracking the frame in replacer and add
    /// back the frame to the free list. Also reset the page frame's memory and metadata.
    fn delete_page(&mut self, page_id: PageId) -> Result<bool> {
        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return Ok(true),
        };
        let page = Arc::clone(&self.pages[frame_id]);
        let mut guard = page.write()?;
        if guard.pin_count > 0 {
            return Ok(false);
        }
        // remove from replacer, a pin count of zero means the frame is
        // evictable there
        self.replacer.remove(frame_id);
        // unlink the page from page table
        self.page_table.remove(&page_id);
        // clean page frame and hand it back to the free list
        guard.clear();
        self.free_list.push(frame_id);
        self.deallocate_page(page_id);

        Ok(true)
    }

    /// Unpin the target page from the buffer pool. If page_id is not in the buffer pool
    /// or its pin count is already 0, return false.
    ///
    /// Decrement the pin count of a page. If the pin count reaches 0, the frame should
    /// be evictable by the replacer. Also, set the dirty flag on the page to indicate if
    /// the page was modified. The dirty flag is sticky: unpinning with
    /// is_dirty false never clears it.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let frame_id = match self.page_table.find(&page_id) {
            Some(frame_id) => frame_id,
            None => return false,
        };
        let page = &self.pages[frame_id];
        let mut guard = page.write().unwrap();
        if guard.pin_count == 0 {
            return false;
        }
        if is_dirty {
            guard.is_dirty = true;
        }
        guard.pin_count -= 1;
        if guard.pin_count == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Pick a replacement frame: the free list first, the replacer only when
    /// no free frame is left.
    fn acquire_frame(&mut self) -> Option<FrameId> {
        if let Some(frame_id) = self.free_list.pop() {
            return Some(frame_id);
        }
        self.replacer.evict()
    }

    /// Write back the resident page, if any and dirty, unlink it from the
    /// page table, then zero the frame for reuse.
    fn reset_frame(&mut self, guard: &mut PageData) -> Result<()> {
        if guard.id != INVALID_PAGE_ID {
            if guard.is_dirty {
                debug!("writing back dirty page {} before frame reuse", guard.id);
                self.flush_frame(guard)?;
            }
            self.page_table.remove(&guard.id);
        }
        guard.clear();
        Ok(())
    }

    /// Write the page image to disk, flushing the log up to the page's lsn
    /// first, and unset the dirty flag.
    fn flush_frame(&mut self, guard: &mut PageData) -> Result<()> {
        if let Some(log) = &self.log {
            log.flush_to(guard.lsn)?;
        }
        self.disk.write_page(guard.id, &guard.data)?;
        guard.is_dirty = false;
        Ok(())
    }

    fn allocate_page(&mut self) -> PageId {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        page_id
    }

    /// Hook for handing a page id back to the allocator. The allocator is a
    /// monotonic counter that does not reuse ids, so this does nothing.
    fn deallocate_page(&mut self, _page_id: PageId) {}
}

/// Buffer pool manager wrap buffer pool with a mutex for concurrent access,
/// basically all the heavy lifting are happens in the buffer pool.
///
/// Note that every operation, disk I/O included, runs under the one mutex.
/// This is coarse but correct; moving the I/O out of the critical section
/// needs in-transit frame markers and is left for a finer-grained pool.
pub struct BufferPoolManager {
    /// hold the actual buffer pool protected by a mutex latch.
    /// TODO: we need more granularity concurrency control instead
    ///  of having this mutex latch all the operations.
    inner: Arc<Mutex<BufferPool>>,
}

impl BufferPoolManager {
    pub fn new(
        disk: Box<dyn DiskManager>,
        log: Option<Arc<dyn LogManager>>,
        pool_size: usize,
        replacer_k: usize,
        bucket_size: usize,
    ) -> Self {
        let inner = BufferPool::new(disk, log, pool_size, replacer_k, bucket_size);
        BufferPoolManager { inner: Arc::new(Mutex::new(inner)) }
    }

    /// Build a manager from configuration: the disk back-end from
    /// storage_type/storage_path, sizing from the pool knobs.
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = match config.storage_path.is_empty() {
            true => None,
            false => Some(Path::new(&config.storage_path)),
        };
        let disk = new_disk_manager(config.storage_type, path)?;
        Ok(BufferPoolManager::new(
            disk,
            None,
            config.pool_size,
            config.replacer_k,
            config.bucket_size,
        ))
    }

    /// Create a new page in buffer pool.
    pub fn new_page(&self) -> Result<Arc<Page>> {
        let mut inner = self.inner.lock()?;
        let page = inner.new_page()?;
        Ok(page)
    }

    /// Fetch the request page with the give page id from the buffer pool.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Arc<Page>> {
        let mut inner = self.inner.lock()?;
        let page = inner.fetch_page(page_id)?;
        Ok(page)
    }

    /// Flush the target page to disk regardless of the dirty flag.
    /// unset the dirty flag of the page after flushing.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.flush_page(page_id)
    }

    /// Flush all the pages in the buffer pool to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.flush_all_pages()
    }

    /// Delete a page from buffer pool. if a page is not in the buffer pool,
    /// it is vacuously deleted and the call returns true. if the page is
    /// pinned and cannot be deleted, return false immediately.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.delete_page(page_id)
    }

    /// Unpin the target page from the buffer pool. If page_id is not in the buffer pool
    /// or its pin count is already 0, return false.
    ///
    /// Decrement the pin count of a page. If the pin count reaches 0, the frame should
    /// be evictable by the replacer. Also, set the dirty flag on the page to indicate if
    /// the page was modified.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.unpin_page(page_id, is_dirty)
    }
}
