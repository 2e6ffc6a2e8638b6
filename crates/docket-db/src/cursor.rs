use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use bson::{Document, doc};
use rand::Rng;
use tracing::debug;

use crate::error::DbError;

/// Which field a batch is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    First,
    Next,
}

/// One batch of a server-side cursor, as returned to the caller.
///
/// An `id` of zero means the cursor is exhausted and no longer exists.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorReply {
    pub id: i64,
    pub ns: String,
    pub batch: Vec<Document>,
    pub kind: BatchKind,
}

impl CursorReply {
    pub fn is_exhausted(&self) -> bool {
        self.id == 0
    }

    pub fn to_document(&self) -> Document {
        let field = match self.kind {
            BatchKind::First => "firstBatch",
            BatchKind::Next => "nextBatch",
        };
        let mut doc = doc! { "id": self.id, "ns": self.ns.as_str() };
        doc.insert(field, self.batch.clone());
        doc
    }
}

/// Outcome of `killCursors`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KillCursorsResult {
    pub killed: Vec<i64>,
    pub not_found: Vec<i64>,
}

/// Remaining results of a cursor. Drained front to back; never rewound.
struct ResultCursor {
    ns: String,
    remaining: VecDeque<Document>,
    last_used: Instant,
}

impl ResultCursor {
    fn take_batch(&mut self, n: usize) -> Vec<Document> {
        let n = n.min(self.remaining.len());
        self.remaining.drain(..n).collect()
    }
}

/// Table of open cursors, keyed by random non-zero id.
pub(crate) struct CursorManager {
    cursors: Mutex<HashMap<i64, ResultCursor>>,
    timeout: Duration,
}

impl CursorManager {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            cursors: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<i64, ResultCursor>>, DbError> {
        self.cursors
            .lock()
            .map_err(|e| DbError::Internal(format!("cursor table lock poisoned: {e}")))
    }

    /// Return the first batch of `results`, registering a cursor for the rest.
    pub(crate) fn open(
        &self,
        ns: String,
        results: Vec<Document>,
        batch_size: usize,
    ) -> Result<CursorReply, DbError> {
        let mut cursor = ResultCursor {
            ns,
            remaining: results.into(),
            last_used: Instant::now(),
        };
        let batch = cursor.take_batch(batch_size);

        if cursor.remaining.is_empty() {
            return Ok(CursorReply {
                id: 0,
                ns: cursor.ns,
                batch,
                kind: BatchKind::First,
            });
        }

        let ns = cursor.ns.clone();
        let remaining = cursor.remaining.len();
        let mut cursors = self.lock()?;
        let mut rng = rand::thread_rng();
        let id = loop {
            let candidate = rng.gen_range(1..i64::MAX);
            if !cursors.contains_key(&candidate) {
                break candidate;
            }
        };
        cursors.insert(id, cursor);
        debug!(cursor_id = id, %ns, remaining, "opened cursor");

        Ok(CursorReply {
            id,
            ns,
            batch,
            kind: BatchKind::First,
        })
    }

    /// Fetch the next batch. `None` or `Some(0)` returns everything left.
    pub(crate) fn get_more(
        &self,
        id: i64,
        batch_size: Option<usize>,
    ) -> Result<CursorReply, DbError> {
        let mut cursors = self.lock()?;
        let cursor = cursors.get_mut(&id).ok_or(DbError::CursorNotFound(id))?;

        let n = match batch_size {
            None | Some(0) => usize::MAX,
            Some(n) => n,
        };
        let batch = cursor.take_batch(n);
        cursor.last_used = Instant::now();
        let ns = cursor.ns.clone();

        let next_id = if cursor.remaining.is_empty() {
            cursors.remove(&id);
            debug!(cursor_id = id, "cursor exhausted");
            0
        } else {
            id
        };

        Ok(CursorReply {
            id: next_id,
            ns,
            batch,
            kind: BatchKind::Next,
        })
    }

    pub(crate) fn kill(&self, ids: &[i64]) -> Result<KillCursorsResult, DbError> {
        let mut cursors = self.lock()?;
        let mut result = KillCursorsResult::default();
        for &id in ids {
            if cursors.remove(&id).is_some() {
                result.killed.push(id);
            } else {
                result.not_found.push(id);
            }
        }
        Ok(result)
    }

    /// Discard cursors idle for at least the configured timeout.
    pub(crate) fn reap_idle(&self, now: Instant) -> Result<usize, DbError> {
        let mut cursors = self.lock()?;
        let before = cursors.len();
        cursors.retain(|_, c| now.saturating_duration_since(c.last_used) < self.timeout);
        let reaped = before - cursors.len();
        if reaped > 0 {
            debug!(reaped, "reaped idle cursors");
        }
        Ok(reaped)
    }

    pub(crate) fn open_count(&self) -> Result<usize, DbError> {
        Ok(self.lock()?.len())
    }
}
