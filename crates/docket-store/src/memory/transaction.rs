use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::MutexGuard;

use crate::error::StoreError;
use crate::store::{KvIter, Transaction};

use super::store::{Changeset, ColumnFamily, MemoryStore};

/// Named handle to a column family of a [`MemoryStore`].
///
/// Lookups resolve through the owning transaction, so a handle sees that
/// transaction's uncommitted writes.
#[derive(Debug, Clone)]
pub struct MemoryCf {
    pub(crate) name: String,
}

/// Whether the transaction may write. Writers own the store's write lock.
pub(crate) enum Access<'a> {
    Read,
    Write(MutexGuard<'a, ()>),
}

/// Private copies of every column family, taken when the transaction began.
struct WorkingSet {
    views: HashMap<String, ColumnFamily>,
    modified: HashSet<String>,
    dropped: HashSet<String>,
}

impl WorkingSet {
    fn new(views: HashMap<String, ColumnFamily>) -> Self {
        Self {
            views,
            modified: HashSet::new(),
            dropped: HashSet::new(),
        }
    }

    fn view(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.views
            .get(name)
            .ok_or_else(|| StoreError::CfNotFound(name.to_string()))
    }

    fn view_mut(&mut self, name: &str) -> Result<&mut ColumnFamily, StoreError> {
        let view = self
            .views
            .get_mut(name)
            .ok_or_else(|| StoreError::CfNotFound(name.to_string()))?;
        self.modified.insert(name.to_string());
        Ok(view)
    }

    fn into_changeset(mut self) -> Changeset {
        let written = self
            .modified
            .iter()
            .filter_map(|name| self.views.remove(name).map(|view| (name.clone(), view)))
            .collect();
        Changeset {
            dropped: self.dropped.into_iter().collect(),
            written,
        }
    }
}

pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    access: Access<'a>,
    working: RefCell<WorkingSet>,
}

impl<'a> MemoryTransaction<'a> {
    pub(crate) fn new(
        store: &'a MemoryStore,
        access: Access<'a>,
        views: HashMap<String, ColumnFamily>,
    ) -> Self {
        Self {
            store,
            access,
            working: RefCell::new(WorkingSet::new(views)),
        }
    }

    fn writable(&self) -> Result<(), StoreError> {
        match self.access {
            Access::Read => Err(StoreError::ReadOnly),
            Access::Write(_) => Ok(()),
        }
    }

    fn write_with<R>(
        &self,
        cf: &MemoryCf,
        f: impl FnOnce(&mut ColumnFamily) -> R,
    ) -> Result<R, StoreError> {
        self.writable()?;
        let mut working = self.working.borrow_mut();
        Ok(f(working.view_mut(&cf.name)?))
    }
}

impl Transaction for MemoryTransaction<'_> {
    type Cf = MemoryCf;

    fn cf(&self, name: &str) -> Result<MemoryCf, StoreError> {
        self.working.borrow().view(name)?;
        Ok(MemoryCf {
            name: name.to_string(),
        })
    }

    fn get(&self, cf: &MemoryCf, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.working.borrow().view(&cf.name)?.get(key).cloned())
    }

    fn scan_prefix<'b>(&'b self, cf: &MemoryCf, prefix: &[u8]) -> Result<KvIter<'b>, StoreError> {
        // Cloning the view is O(1); the iterator then owns its own snapshot.
        let view = self.working.borrow().view(&cf.name)?.clone();
        let prefix = prefix.to_vec();
        let start = prefix.clone();
        let matching: Vec<(Vec<u8>, Vec<u8>)> = view
            .range(start..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Box::new(matching.into_iter().map(Ok)))
    }

    fn put(&self, cf: &MemoryCf, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.write_with(cf, |view| {
            view.insert(key.to_vec(), value.to_vec());
        })
    }

    fn delete(&self, cf: &MemoryCf, key: &[u8]) -> Result<(), StoreError> {
        self.write_with(cf, |view| {
            view.remove(key);
        })
    }

    fn create_cf(&mut self, name: &str) -> Result<(), StoreError> {
        self.writable()?;
        let working = self.working.get_mut();
        // A CF dropped earlier in this transaction is already gone from
        // `views`, so recreating it starts empty.
        if !working.views.contains_key(name) {
            working.views.insert(name.to_string(), ColumnFamily::new());
            working.modified.insert(name.to_string());
        }
        Ok(())
    }

    fn drop_cf(&mut self, name: &str) -> Result<(), StoreError> {
        self.writable()?;
        let working = self.working.get_mut();
        working.views.remove(name);
        working.modified.remove(name);
        working.dropped.insert(name.to_string());
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        if let Access::Read = self.access {
            return Ok(());
        }
        let changes = self.working.into_inner().into_changeset();
        if changes.is_empty() {
            return Ok(());
        }
        self.store.publish(changes)
    }

    fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
