use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use arc_swap::ArcSwap;
use imbl::OrdMap;

use crate::error::StoreError;
use crate::store::Store;

use super::transaction::{Access, MemoryTransaction};

pub(crate) type ColumnFamily = OrdMap<Vec<u8>, Vec<u8>>;

/// Changes accumulated by a write transaction, published on commit.
pub(crate) struct Changeset {
    pub(crate) dropped: Vec<String>,
    pub(crate) written: Vec<(String, ColumnFamily)>,
}

impl Changeset {
    pub(crate) fn is_empty(&self) -> bool {
        self.dropped.is_empty() && self.written.is_empty()
    }
}

/// In-memory store backed by persistent ordered maps.
///
/// Each column family lives behind an [`ArcSwap`], so readers take a snapshot
/// with a single atomic load and never contend with writers. Writers hold
/// `write_lock` for the whole transaction and publish every dirty column
/// family at commit.
pub struct MemoryStore {
    cfs: RwLock<HashMap<String, Arc<ArcSwap<ColumnFamily>>>>,
    write_lock: Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            cfs: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Names of every column family currently published.
    pub fn cf_names(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.read_cfs()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Snapshot every column family at once. Cheap due to imbl structural sharing.
    pub(crate) fn snapshot_cfs(&self) -> Result<HashMap<String, ColumnFamily>, StoreError> {
        let cfs = self.read_cfs()?;
        Ok(cfs
            .iter()
            .map(|(name, arc)| (name.clone(), (**arc.load()).clone()))
            .collect())
    }

    pub(crate) fn publish(&self, changes: Changeset) -> Result<(), StoreError> {
        let mut cfs = self.write_cfs()?;
        for name in changes.dropped {
            cfs.remove(&name);
        }
        for (name, data) in changes.written {
            match cfs.get(&name) {
                Some(arc) => arc.store(Arc::new(data)),
                None => {
                    cfs.insert(name, Arc::new(ArcSwap::new(Arc::new(data))));
                }
            }
        }
        Ok(())
    }

    fn read_cfs(
        &self,
    ) -> Result<RwLockReadGuard<'_, HashMap<String, Arc<ArcSwap<ColumnFamily>>>>, StoreError> {
        self.cfs
            .read()
            .map_err(|e| StoreError::Storage(format!("cf table lock poisoned: {e}")))
    }

    fn write_cfs(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<String, Arc<ArcSwap<ColumnFamily>>>>, StoreError> {
        self.cfs
            .write()
            .map_err(|e| StoreError::Storage(format!("cf table lock poisoned: {e}")))
    }
}

impl Store for MemoryStore {
    type Txn<'a> = MemoryTransaction<'a>;

    fn begin(&self, read_only: bool) -> Result<Self::Txn<'_>, StoreError> {
        if read_only {
            let views = self.snapshot_cfs()?;
            return Ok(MemoryTransaction::new(self, Access::Read, views));
        }
        let guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
        // Snapshot after the lock so the writer starts from the latest commit.
        let views = self.snapshot_cfs()?;
        Ok(MemoryTransaction::new(self, Access::Write(guard), views))
    }

    fn create_cf(&self, name: &str) -> Result<(), StoreError> {
        let mut cfs = self.write_cfs()?;
        cfs.entry(name.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::new(Arc::new(OrdMap::new()))));
        Ok(())
    }

    fn drop_cf(&self, name: &str) -> Result<(), StoreError> {
        let mut cfs = self.write_cfs()?;
        cfs.remove(name);
        Ok(())
    }
}
