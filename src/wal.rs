use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;

/// Log sequence number. Pages carry the lsn of their newest update so the
/// buffer pool can enforce write-ahead ordering on eviction.
pub type Lsn = u64;

/// The write-ahead log collaborator of the buffer pool. The pool calls
/// flush_to before any dirty page image goes to disk; the log's internals
/// (record format, group commit, recovery) live elsewhere.
pub trait LogManager: Debug + Send + Sync {
    /// Block until all log records up to and including lsn are durable.
    fn flush_to(&self, lsn: Lsn) -> Result<()>;
}

/// An in-process log manager that only tracks the durable high-water mark.
/// Enough for tests and for pools running without a real log.
#[derive(Debug, Default)]
pub struct MemoryLog {
    next_lsn: AtomicU64,
    flushed_lsn: AtomicU64,
}

impl MemoryLog {
    pub fn new() -> Self {
        MemoryLog::default()
    }

    /// Hand out the next lsn, as a stand-in for appending a record.
    pub fn append(&self) -> Lsn {
        self.next_lsn.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn flushed_lsn(&self) -> Lsn {
        self.flushed_lsn.load(Ordering::SeqCst)
    }
}

impl LogManager for MemoryLog {
    fn flush_to(&self, lsn: Lsn) -> Result<()> {
        self.flushed_lsn.fetch_max(lsn, Ordering::SeqCst);
        Ok(())
    }
}
