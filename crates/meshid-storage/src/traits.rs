//! Storage trait definitions.

use crate::errors::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Key-value store split into column families
///
/// Keys and values are bincode-encoded. Composite keys are tuples, and
/// bincode writes a string's length before its bytes, so a prefix query on
/// the first tuple element matches that element exactly.
#[async_trait]
pub trait Storage: Send + Sync {
    /// `Ok(None)` when the key is absent
    async fn get<K, V>(&self, cf: &str, key: &K) -> Result<Option<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned;

    async fn put<K, V>(&self, cf: &str, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync;

    async fn delete<K>(&self, cf: &str, key: &K) -> Result<()>
    where
        K: Serialize + Send + Sync;

    async fn exists<K>(&self, cf: &str, key: &K) -> Result<bool>
    where
        K: Serialize + Send + Sync;

    /// Entries whose encoded key starts with the encoded `prefix`, in key
    /// order, with raw keys for [`deserialize_key`]
    async fn get_by_prefix<K, V>(&self, cf: &str, prefix: &K) -> Result<Vec<(Vec<u8>, V)>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned;

    /// Every entry of a column family in key order
    async fn scan_all<V>(&self, cf: &str) -> Result<Vec<(Vec<u8>, V)>>
    where
        V: DeserializeOwned;

    /// Start an atomic write spanning any column families.
    ///
    /// Dropping the batch without committing discards it.
    fn batch(&self) -> Box<dyn Batch>;
}

/// Atomic multi-column-family write
///
/// Works on encoded bytes to stay object safe; [`BatchExt`] adds typed
/// keys and values.
#[async_trait]
pub trait Batch: Send {
    fn put_raw(&mut self, cf: &str, key: Vec<u8>, value: Vec<u8>) -> Result<()>;

    fn delete_raw(&mut self, cf: &str, key: Vec<u8>) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Typed helpers over [`Batch`]
pub trait BatchExt: Batch {
    fn put<K, V>(&mut self, cf: &str, key: &K, value: &V) -> Result<()>
    where
        K: Serialize,
        V: Serialize,
    {
        self.put_raw(cf, encode(key)?, encode(value)?)
    }

    fn delete<K>(&mut self, cf: &str, key: &K) -> Result<()>
    where
        K: Serialize,
    {
        self.delete_raw(cf, encode(key)?)
    }
}

impl<T: Batch + ?Sized> BatchExt for T {}

/// Decode a raw key returned by [`Storage::get_by_prefix`] or [`Storage::scan_all`]
pub fn deserialize_key<K: DeserializeOwned>(bytes: &[u8]) -> Result<K> {
    decode(bytes)
}

pub(crate) fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
