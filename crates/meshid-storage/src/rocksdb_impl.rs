//! RocksDB storage implementation.

use crate::{
    column_families::all_column_families,
    errors::{Result, StorageError},
    traits::{decode, encode, Batch, Storage},
};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::{path::Path, sync::Arc};
use tempfile::TempDir;
use tracing::{debug, info};

/// RocksDB-backed [`Storage`]
pub struct RocksDbStorage {
    db: Arc<DB>,
    // Must drop after `db`.
    _temp_dir: Option<TempDir>,
}

impl RocksDbStorage {
    /// Open or create the database at `path` with every meshid column family
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Self::open_db(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Storage opened");

        Ok(Self {
            db: Arc::new(db),
            _temp_dir: None,
        })
    }

    /// Open a throwaway database, removed on drop.
    ///
    /// Public so other crates' test modules can use it.
    pub fn open_test() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let db = Self::open_db(temp_dir.path())?;

        Ok(Self {
            db: Arc::new(db),
            _temp_dir: Some(temp_dir),
        })
    }

    fn open_db(path: &Path) -> Result<DB> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        Ok(DB::open_cf(&opts, path, all_column_families())?)
    }

    fn handle(&self, cf: &str) -> Result<&ColumnFamily> {
        column_family(&self.db, cf)
    }

    /// Decode entries from `mode` onwards while their keys start with `prefix`
    fn collect<V: DeserializeOwned>(
        &self,
        cf: &str,
        mode: IteratorMode<'_>,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, V)>> {
        let mut entries = Vec::new();

        for item in self.db.iterator_cf(self.handle(cf)?, mode) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), decode(&value)?));
        }

        Ok(entries)
    }
}

fn column_family<'a>(db: &'a DB, cf: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(cf)
        .ok_or_else(|| StorageError::UnknownColumnFamily(cf.to_string()))
}

#[async_trait]
impl Storage for RocksDbStorage {
    async fn get<K, V>(&self, cf: &str, key: &K) -> Result<Option<V>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        let bytes = self.db.get_pinned_cf(self.handle(cf)?, encode(key)?)?;
        bytes.map(|b| decode(&b)).transpose()
    }

    async fn put<K, V>(&self, cf: &str, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + Send + Sync,
        V: Serialize + Send + Sync,
    {
        Ok(self
            .db
            .put_cf(self.handle(cf)?, encode(key)?, encode(value)?)?)
    }

    async fn delete<K>(&self, cf: &str, key: &K) -> Result<()>
    where
        K: Serialize + Send + Sync,
    {
        Ok(self.db.delete_cf(self.handle(cf)?, encode(key)?)?)
    }

    async fn exists<K>(&self, cf: &str, key: &K) -> Result<bool>
    where
        K: Serialize + Send + Sync,
    {
        Ok(self
            .db
            .get_pinned_cf(self.handle(cf)?, encode(key)?)?
            .is_some())
    }

    async fn get_by_prefix<K, V>(&self, cf: &str, prefix: &K) -> Result<Vec<(Vec<u8>, V)>>
    where
        K: Serialize + Send + Sync,
        V: DeserializeOwned,
    {
        let prefix = encode(prefix)?;
        // No prefix extractor is configured; sorted keys let the scan stop
        // at the first key past the prefix.
        self.collect(cf, IteratorMode::From(&prefix, Direction::Forward), &prefix)
    }

    async fn scan_all<V>(&self, cf: &str) -> Result<Vec<(Vec<u8>, V)>>
    where
        V: DeserializeOwned,
    {
        self.collect(cf, IteratorMode::Start, &[])
    }

    fn batch(&self) -> Box<dyn Batch> {
        Box::new(RocksDbBatch {
            db: Arc::clone(&self.db),
            writes: WriteBatch::default(),
        })
    }
}

/// Pending [`WriteBatch`] bound to its database
pub struct RocksDbBatch {
    db: Arc<DB>,
    writes: WriteBatch,
}

#[async_trait]
impl Batch for RocksDbBatch {
    fn put_raw(&mut self, cf: &str, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let handle = column_family(&self.db, cf)?;
        self.writes.put_cf(handle, key, value);
        Ok(())
    }

    fn delete_raw(&mut self, cf: &str, key: Vec<u8>) -> Result<()> {
        let handle = column_family(&self.db, cf)?;
        self.writes.delete_cf(handle, key);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let ops = self.writes.len();
        self.db.write(self.writes)?;

        debug!(ops, "Batch committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_families::*;
    use crate::traits::{deserialize_key, BatchExt};
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Account {
        id: String,
        identity: String,
    }

    fn account(id: &str) -> Account {
        Account {
            id: id.to_string(),
            identity: format!("{}@example.com", id),
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let storage = RocksDbStorage::open_test().unwrap();
        let alice = account("alice");

        assert!(!storage.exists(CF_CLIENTS, &alice.id).await.unwrap());
        storage.put(CF_CLIENTS, &alice.id, &alice).await.unwrap();

        let loaded: Option<Account> = storage.get(CF_CLIENTS, &alice.id).await.unwrap();
        assert_eq!(loaded, Some(alice.clone()));

        storage.delete(CF_CLIENTS, &alice.id).await.unwrap();
        let gone: Option<Account> = storage.get(CF_CLIENTS, &alice.id).await.unwrap();
        assert_eq!(gone, None);
    }

    #[tokio::test]
    async fn test_unknown_column_family() {
        let storage = RocksDbStorage::open_test().unwrap();

        let err = storage.put("nope", &1u8, &1u8).await.unwrap_err();
        assert!(matches!(err, StorageError::UnknownColumnFamily(cf) if cf == "nope"));

        let mut batch = storage.batch();
        assert!(batch.put("nope", &1u8, &1u8).is_err());
    }

    #[tokio::test]
    async fn test_decoding_wrong_type_is_codec_error() {
        let storage = RocksDbStorage::open_test().unwrap();
        storage.put(CF_CLIENTS, &"x", &1u8).await.unwrap();

        let err = storage
            .get::<_, Account>(CF_CLIENTS, &"x")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Codec(_)));
    }

    #[tokio::test]
    async fn test_batch_writes_record_and_index_together() {
        let storage = RocksDbStorage::open_test().unwrap();
        let alice = account("alice");

        let mut batch = storage.batch();
        batch.put(CF_CLIENTS, &alice.id, &alice).unwrap();
        batch
            .put(CF_CLIENTS_BY_IDENTITY, &alice.identity, &alice.id)
            .unwrap();

        // Nothing is visible before commit
        assert!(!storage.exists(CF_CLIENTS, &alice.id).await.unwrap());
        batch.commit().await.unwrap();

        let indexed: Option<String> = storage
            .get(CF_CLIENTS_BY_IDENTITY, &alice.identity)
            .await
            .unwrap();
        assert_eq!(indexed, Some(alice.id));
    }

    #[tokio::test]
    async fn test_dropped_batch_is_discarded() {
        let storage = RocksDbStorage::open_test().unwrap();
        let alice = account("alice");

        {
            let mut batch = storage.batch();
            batch.put(CF_CLIENTS, &alice.id, &alice).unwrap();
        }

        assert!(!storage.exists(CF_CLIENTS, &alice.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_prefix_matches_whole_first_element() {
        let storage = RocksDbStorage::open_test().unwrap();

        let keys = [
            ("user-1", "thing-1"),
            ("user-1", "thing-2"),
            ("user-10", "thing-1"),
            ("user-2", "thing-1"),
        ];
        for (subject, object) in keys {
            let key = (subject.to_string(), object.to_string());
            storage.put(CF_POLICIES, &key, &()).await.unwrap();
        }

        let rows: Vec<(Vec<u8>, ())> = storage
            .get_by_prefix(CF_POLICIES, &"user-1".to_string())
            .await
            .unwrap();

        let objects: Vec<String> = rows
            .iter()
            .map(|(raw, _)| deserialize_key::<(String, String)>(raw).unwrap().1)
            .collect();
        assert_eq!(objects, vec!["thing-1", "thing-2"]);
    }

    #[tokio::test]
    async fn test_scan_all_stays_in_column_family() {
        let storage = RocksDbStorage::open_test().unwrap();

        for id in ["a", "b", "c"] {
            storage.put(CF_CLIENTS, &id, &account(id)).await.unwrap();
        }
        storage
            .put(CF_CLIENTS_BY_IDENTITY, &"a@example.com", &"a")
            .await
            .unwrap();

        let all: Vec<(Vec<u8>, Account)> = storage.scan_all(CF_CLIENTS).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|(_, a)| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
