use docket_store::Store;
use tracing::trace;

use super::result::ResultAggregator;
use super::router::RoutedOp;
use crate::database::Database;
use crate::error::DbError;
use crate::validation::ValidationGate;

/// Applies routed inserts one at a time, each in its own write transaction.
pub(crate) struct BatchExecutor<'a, S: Store> {
    db: &'a Database<S>,
    gate: ValidationGate,
    ordered: bool,
}

impl<'a, S: Store> BatchExecutor<'a, S> {
    pub(crate) fn new(db: &'a Database<S>, gate: ValidationGate, ordered: bool) -> Self {
        Self { db, gate, ordered }
    }

    /// Execute `ops` in order. When ordered, the first failure marks every
    /// later op as not attempted.
    pub(crate) fn run(&self, ops: &[RoutedOp<'_>], results: &mut ResultAggregator) {
        let mut halted = false;
        for op in ops {
            if halted {
                results.skip(op.index);
                continue;
            }
            let outcome = self.insert_one(op);
            if let Err(e) = &outcome {
                trace!(idx = op.index, ns = %op.ns, error = %e, "operation failed");
                halted = self.ordered;
            }
            results.record(op.index, outcome);
        }
    }

    fn insert_one(&self, op: &RoutedOp<'_>) -> Result<(), DbError> {
        let mut txn = self.db.begin(false)?;
        match txn.insert_with(op.ns, op.document.clone(), &self.gate) {
            Ok(_) => txn.commit(),
            Err(e) => {
                txn.rollback()?;
                Err(e)
            }
        }
    }
}
