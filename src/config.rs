use serde::Deserialize;

use crate::error::Result;
use crate::storage::StorageType;

#[derive(Debug, PartialEq, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    pub storage_type: StorageType,
    /// Path of the page file, only meaningful for file storage.
    pub storage_path: String,
    /// Number of in-memory frames in the buffer pool.
    pub pool_size: usize,
    /// The k in LRU-K.
    pub replacer_k: usize,
    /// Capacity of each page table hash bucket.
    pub bucket_size: usize,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("log_level", "debug")?
            .set_default("storage_type", "memory")?
            .set_default("storage_path", "")?
            .set_default("pool_size", 64)?
            .set_default("replacer_k", 2)?
            .set_default("bucket_size", 8)?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("PAGEPOOL"));
        Ok(cfg.build()?.try_deserialize()?)
    }
}
