//! Error types for block storage access

use thiserror::Error;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while listing or reading blocks
#[derive(Error, Debug)]
pub enum StorageError {
    /// Object store request failed
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// Block metadata could not be parsed
    #[error("Invalid block meta {path}: {source}")]
    InvalidMeta {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Neither meta.json nor meta.compacted.json exists for the block
    #[error("Block {block_id} not found for tenant {tenant_id}")]
    BlockNotFound { tenant_id: String, block_id: String },

    /// A read went past the end of the object
    #[error("Read of {len} bytes at offset {offset} is out of bounds (size {size})")]
    OutOfBounds { offset: u64, len: usize, size: u64 },

    /// Backend configuration error
    #[error("Invalid storage configuration: {0}")]
    Config(String),

    /// A reader panicked while holding the read window cache
    #[error("Read window cache lock poisoned")]
    CachePoisoned,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
