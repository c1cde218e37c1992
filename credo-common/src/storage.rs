//! storage.rs
//!
//! Local key-value persistence for every component's bounded collections.
//!
//! Each collection is stored under a fixed key as a JSON document. A missing
//! or unreadable document is never fatal: it is logged and treated as empty.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::RwLock;

use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{CredoError, Result};

const COLLECTIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("collections");

pub mod keys {
    pub const MINT_HISTORY: &str = "mint.history";
    pub const MINT_FALLBACK: &str = "mint.fallback";
    pub const MINT_METRICS: &str = "mint.metrics";
    pub const SYNC_LEDGER: &str = "sync.ledger";
    pub const SYNC_LOG: &str = "sync.log";
    pub const SYNC_FALLBACK: &str = "sync.fallback";
    pub const SYNC_METRICS: &str = "sync.metrics";
    pub const RECONCILE_CONFLICTS: &str = "reconcile.conflicts";
    pub const RECONCILE_FALLBACK: &str = "reconcile.fallback";
    pub const RECONCILE_METRICS: &str = "reconcile.metrics";
    pub const EXPORT_HISTORY: &str = "export.history";
    pub const EXPORT_FALLBACK: &str = "export.fallback";
    pub const EXPORT_METRICS: &str = "export.metrics";
}

/// Minimal key-value contract shared by the in-memory and on-disk stores.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

fn storage_err(e: impl fmt::Display) -> CredoError {
    CredoError::Storage(e.to_string())
}

/// Volatile store used by tests and detached engines.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(storage_err)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().map_err(storage_err)?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(storage_err)?;
        entries.remove(key);
        Ok(())
    }
}

/// Single-file redb database holding one `collections` table.
pub struct RedbStore {
    db: Database,
}

impl fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedbStore").field("db", &"Redb").finish()
    }
}

impl RedbStore {
    /// Opens (or creates) `<data_dir>/credo.redb`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let path = data_dir.as_ref().join("credo.redb");
        let db = Database::create(path).map_err(storage_err)?;

        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            let _table = write_txn.open_table(COLLECTIONS_TABLE).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(COLLECTIONS_TABLE).map_err(storage_err)?;
        let value = table.get(key).map_err(storage_err)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(COLLECTIONS_TABLE).map_err(storage_err)?;
            table.insert(key, value).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(COLLECTIONS_TABLE).map_err(storage_err)?;
            table.remove(key).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }
}

/// Loads a collection, falling back to `T::default()` on a missing or corrupt entry.
pub fn load_collection<T>(store: &dyn KvStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match store.get(key) {
        Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                warn!("⚠️ Corrupt collection '{}', starting empty: {}", key, e);
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            warn!("⚠️ Failed to read collection '{}', starting empty: {}", key, e);
            T::default()
        }
    }
}

pub fn save_collection<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    store.put(key, &bytes)
}

/// Like [`save_collection`], but only logs failures. Persistence is best effort
/// for the simulation engines: a failed write never fails the operation.
pub fn persist<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) {
    if let Err(e) = save_collection(store, key, value) {
        warn!("❌ Failed to persist collection '{}': {}", key, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        save_collection(&store, "k", &vec![1u32, 2, 3]).unwrap();
        let loaded: Vec<u32> = load_collection(&store, "k");
        assert_eq!(loaded, vec![1, 2, 3]);

        store.remove("k").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_and_corrupt_load_as_empty() {
        let store = MemoryStore::new();
        let missing: Vec<String> = load_collection(&store, "absent");
        assert!(missing.is_empty());

        store.put("bad", b"{not json").unwrap();
        let corrupt: Vec<String> = load_collection(&store, "bad");
        assert!(corrupt.is_empty());
    }

    #[test]
    fn test_redb_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RedbStore::open(dir.path()).unwrap();
            save_collection(&store, keys::SYNC_LOG, &vec!["a", "b"]).unwrap();
        }
        let store = RedbStore::open(dir.path()).unwrap();
        let loaded: Vec<String> = load_collection(&store, keys::SYNC_LOG);
        assert_eq!(loaded, vec!["a".to_string(), "b".to_string()]);

        store.remove(keys::SYNC_LOG).unwrap();
        assert!(store.get(keys::SYNC_LOG).unwrap().is_none());
    }
}
