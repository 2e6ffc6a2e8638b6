use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bson::{Bson, Document};
use docket_query::{Expression, matches, parse_filter};
use docket_store::{Store, Transaction};
use tracing::{debug, warn};

use crate::catalog::{Catalog, CollMod, CollectionOptions, SYS_CF};
use crate::config::DatabaseConfig;
use crate::cursor::{CursorManager, CursorReply, KillCursorsResult};
use crate::encoding;
use crate::error::DbError;
use crate::namespace::Namespace;
use crate::validation::{ValidationGate, check_validator};

pub struct Database<S: Store> {
    pub(crate) store: S,
    pub(crate) catalog: Catalog,
    pub(crate) config: DatabaseConfig,
    pub(crate) cursors: Arc<CursorManager>,
    sweeper: Option<SweepHandle>,
}

impl<S: Store> Database<S> {
    /// Open a database over `store`, starting the idle-cursor sweeper unless
    /// `cursor_sweep_interval_secs` is zero.
    pub fn open(store: S, config: DatabaseConfig) -> Result<Self, DbError> {
        store.create_cf(SYS_CF)?;
        let cursors = Arc::new(CursorManager::new(Duration::from_secs(
            config.cursor_timeout_secs,
        )));

        let sweeper = match config.cursor_sweep_interval_secs {
            0 => None,
            secs => {
                let cursors = Arc::clone(&cursors);
                Some(SweepHandle::spawn(Duration::from_secs(secs), move || {
                    if let Err(e) = cursors.reap_idle(Instant::now()) {
                        warn!(error = %e, "cursor sweep failed");
                    }
                }))
            }
        };

        Ok(Self {
            store,
            catalog: Catalog,
            config,
            cursors,
            sweeper,
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn begin(&self, read_only: bool) -> Result<DatabaseTransaction<'_, S>, DbError> {
        let txn = self.store.begin(read_only)?;
        let sys = txn.cf(SYS_CF)?;
        Ok(DatabaseTransaction {
            txn,
            sys,
            catalog: &self.catalog,
        })
    }

    // ── Cursors ─────────────────────────────────────────────────

    /// Fetch the next batch of an open cursor.
    pub fn get_more(&self, cursor_id: i64, batch_size: Option<usize>) -> Result<CursorReply, DbError> {
        self.cursors.get_more(cursor_id, batch_size)
    }

    pub fn kill_cursors(&self, cursor_ids: &[i64]) -> Result<KillCursorsResult, DbError> {
        self.cursors.kill(cursor_ids)
    }

    /// Discard cursors idle longer than `cursor_timeout_secs`. Returns how many were removed.
    pub fn reap_idle_cursors(&self) -> Result<usize, DbError> {
        self.cursors.reap_idle(Instant::now())
    }

    pub fn open_cursor_count(&self) -> Result<usize, DbError> {
        self.cursors.open_count()
    }

    /// Gracefully stop background tasks.
    pub fn shutdown(&mut self) {
        if let Some(mut handle) = self.sweeper.take() {
            handle.stop();
        }
    }
}

struct SweepHandle {
    shutdown: Arc<AtomicBool>,
    notify: Arc<(Mutex<()>, Condvar)>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SweepHandle {
    /// Run `sweep` every `interval` until stopped.
    fn spawn(interval: Duration, mut sweep: impl FnMut() + Send + 'static) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let notify = Arc::new((Mutex::new(()), Condvar::new()));
        let sweep_flag = Arc::clone(&shutdown);
        let sweep_notify = Arc::clone(&notify);

        let handle = thread::spawn(move || {
            loop {
                let (lock, cvar) = &*sweep_notify;
                let Ok(guard) = lock.lock() else {
                    break;
                };
                if sweep_flag.load(Ordering::Relaxed) {
                    break;
                }
                if cvar.wait_timeout(guard, interval).is_err() {
                    break;
                }
                if sweep_flag.load(Ordering::Relaxed) {
                    break;
                }
                sweep();
            }
        });

        Self {
            shutdown,
            notify,
            handle: Some(handle),
        }
    }

    fn stop(&mut self) {
        let (lock, cvar) = &*self.notify;
        // Set under the lock so the sweeper cannot miss the wakeup.
        let guard = lock.lock();
        self.shutdown.store(true, Ordering::Relaxed);
        drop(guard);
        cvar.notify_one();
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                warn!("cursor sweeper thread panicked");
            }
        }
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct DatabaseTransaction<'db, S: Store + 'db> {
    txn: S::Txn<'db>,
    sys: <S::Txn<'db> as Transaction>::Cf,
    catalog: &'db Catalog,
}

impl<'db, S: Store + 'db> DatabaseTransaction<'db, S> {
    // ── Collection management ───────────────────────────────────

    /// Create a collection explicitly. Fails with NamespaceExists if it is already registered.
    pub fn create_collection(
        &mut self,
        ns: &Namespace,
        options: &CollectionOptions,
    ) -> Result<(), DbError> {
        if self.catalog.get(&self.txn, &self.sys, ns)?.is_some() {
            return Err(DbError::NamespaceExists(ns.to_string()));
        }
        if let Some(validator) = &options.validator {
            check_validator(validator)?;
        }
        self.register(ns, options)
    }

    /// Return the collection's options, creating it with defaults on first use.
    pub fn ensure_collection(&mut self, ns: &Namespace) -> Result<CollectionOptions, DbError> {
        if let Some(options) = self.catalog.get(&self.txn, &self.sys, ns)? {
            return Ok(options);
        }
        let options = CollectionOptions::default();
        self.register(ns, &options)?;
        debug!(%ns, "implicitly created collection");
        Ok(options)
    }

    pub fn collection_options(&self, ns: &Namespace) -> Result<Option<CollectionOptions>, DbError> {
        self.catalog.get(&self.txn, &self.sys, ns)
    }

    /// Change validation settings of an existing collection.
    pub fn coll_mod(&mut self, ns: &Namespace, update: CollMod) -> Result<CollectionOptions, DbError> {
        let mut options = self
            .catalog
            .get(&self.txn, &self.sys, ns)?
            .ok_or_else(|| DbError::NamespaceNotFound(ns.to_string()))?;
        if let Some(validator) = &update.validator {
            check_validator(validator)?;
        }
        update.apply(&mut options);
        self.catalog.put(&self.txn, &self.sys, ns, &options)?;
        Ok(options)
    }

    /// Drop a collection and all its documents. Returns whether it existed.
    pub fn drop_collection(&mut self, ns: &Namespace) -> Result<bool, DbError> {
        if self.catalog.get(&self.txn, &self.sys, ns)?.is_none() {
            return Ok(false);
        }
        self.txn.drop_cf(&ns.to_string())?;
        self.catalog.remove(&self.txn, &self.sys, ns)?;
        Ok(true)
    }

    /// List collection names in `db`.
    pub fn list_collections(&self, db: &str) -> Result<Vec<String>, DbError> {
        Ok(self
            .catalog
            .list(&self.txn, &self.sys)?
            .into_iter()
            .filter(|ns| ns.db() == db)
            .map(|ns| ns.coll().to_string())
            .collect())
    }

    // ── Documents ───────────────────────────────────────────────

    /// Insert a single document, enforcing the collection's validator.
    ///
    /// The collection is created on first insert. A missing `_id` is filled
    /// with a fresh ObjectId. Fails with DuplicateKey if the `_id` exists.
    pub fn insert(&mut self, ns: &Namespace, doc: Document) -> Result<Bson, DbError> {
        self.insert_with(ns, doc, &ValidationGate::new(false))
    }

    pub(crate) fn insert_with(
        &mut self,
        ns: &Namespace,
        doc: Document,
        gate: &ValidationGate,
    ) -> Result<Bson, DbError> {
        let options = self.ensure_collection(ns)?;
        let (id, doc) = encoding::with_id_first(doc)?;
        gate.check(ns, &options, &doc)?;

        let cf = self.txn.cf(&ns.to_string())?;
        let key = encoding::record_key(&id)?;
        if self.txn.get(&cf, &key)?.is_some() {
            return Err(DbError::DuplicateKey {
                ns: ns.to_string(),
                id,
            });
        }
        self.txn.put(&cf, &key, &encoding::encode_document(&doc)?)?;
        Ok(id)
    }

    /// Get a single document by `_id`.
    pub fn find_by_id(&self, ns: &Namespace, id: &Bson) -> Result<Option<Document>, DbError> {
        let Some(cf) = self.collection_cf(ns)? else {
            return Ok(None);
        };
        match self.txn.get(&cf, &encoding::record_key(id)?)? {
            Some(bytes) => Ok(Some(encoding::decode_document(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Find documents matching a filter, in `_id` key order.
    pub fn find(&self, ns: &Namespace, filter: Option<&Document>) -> Result<Vec<Document>, DbError> {
        let expr = compile(filter)?;
        let mut out = Vec::new();
        self.scan(ns, |doc| {
            if matches(&doc, &expr) {
                out.push(doc);
            }
        })?;
        Ok(out)
    }

    /// Count documents matching a filter. A missing collection counts as empty.
    pub fn count(&self, ns: &Namespace, filter: Option<&Document>) -> Result<u64, DbError> {
        let expr = compile(filter)?;
        let mut n = 0u64;
        self.scan(ns, |doc| {
            if matches(&doc, &expr) {
                n += 1;
            }
        })?;
        Ok(n)
    }

    // ── Lifecycle ───────────────────────────────────────────────

    pub fn commit(self) -> Result<(), DbError> {
        self.txn.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> Result<(), DbError> {
        self.txn.rollback()?;
        Ok(())
    }

    // ── Private helpers ─────────────────────────────────────────

    fn register(&mut self, ns: &Namespace, options: &CollectionOptions) -> Result<(), DbError> {
        self.txn.create_cf(&ns.to_string())?;
        self.catalog.put(&self.txn, &self.sys, ns, options)
    }

    /// Resolve a collection CF, or `None` if the collection is not registered.
    fn collection_cf(
        &self,
        ns: &Namespace,
    ) -> Result<Option<<S::Txn<'db> as Transaction>::Cf>, DbError> {
        if self.catalog.get(&self.txn, &self.sys, ns)?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.txn.cf(&ns.to_string())?))
    }

    fn scan(&self, ns: &Namespace, mut f: impl FnMut(Document)) -> Result<(), DbError> {
        let Some(cf) = self.collection_cf(ns)? else {
            return Ok(());
        };
        for result in self.txn.scan_prefix(&cf, encoding::DOC_PREFIX)? {
            let (_, value) = result?;
            f(encoding::decode_document(&value)?);
        }
        Ok(())
    }
}

fn compile(filter: Option<&Document>) -> Result<Expression, DbError> {
    match filter {
        Some(filter) => Ok(parse_filter(filter)?),
        None => Ok(Expression::always()),
    }
}
