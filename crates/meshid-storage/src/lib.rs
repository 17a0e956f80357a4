//! # meshid-storage
//!
//! Storage abstraction layer for meshid using RocksDB.
//!
//! Account records, the identity uniqueness index and ReBAC policy rows each
//! live in their own column family.

#![warn(clippy::all)]

pub mod column_families;
pub mod errors;
pub mod rocksdb_impl;
pub mod traits;

pub use column_families::*;
pub use errors::{Result, StorageError};
pub use rocksdb_impl::RocksDbStorage;
pub use traits::{Batch, BatchExt, Storage};
