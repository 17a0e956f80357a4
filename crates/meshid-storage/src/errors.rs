//! Storage error types.

use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// RocksDB rejected a read, write or open
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Backend failure not raised by RocksDB itself
    #[error("Database error: {0}")]
    Database(String),

    /// A key or value could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Unknown column family: {0}")]
    UnknownColumnFamily(String),

    /// Temporary directory setup failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;
