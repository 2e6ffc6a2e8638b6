mod executor;
mod request;
mod result;
mod router;

pub use request::{BulkWriteOptions, BulkWriteRequest, NamespaceInfo, Operation};
pub use result::{BulkWriteReply, BulkWriteResult, OperationResult, OperationStatus};

use docket_store::Store;
use tracing::{debug, debug_span, trace};

use crate::database::Database;
use crate::error::DbError;
use crate::validation::ValidationGate;
use executor::BatchExecutor;
use result::ResultAggregator;
use router::Router;

/// Namespace reported by bulk write result cursors.
pub const BULK_WRITE_CURSOR_NS: &str = "admin.$cmd.bulkWrite";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Received,
    Routing,
    Executing,
    Finalized,
}

/// Lifecycle of one request. Moves forward only and finalizes once.
struct RequestState {
    phase: Phase,
}

impl RequestState {
    fn new() -> Self {
        trace!(phase = ?Phase::Received, "bulk write state");
        Self {
            phase: Phase::Received,
        }
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(next > self.phase, "{:?} -> {:?}", self.phase, next);
        trace!(from = ?self.phase, to = ?next, "bulk write state");
        self.phase = next;
    }
}

impl<S: Store> Database<S> {
    /// Run a bulk write and return every per-operation outcome.
    ///
    /// Routing completes before the first write, so a request that fails
    /// routing leaves the database untouched.
    pub fn execute_bulk_write(&self, req: &BulkWriteRequest) -> Result<BulkWriteResult, DbError> {
        let span = debug_span!(
            "bulk_write",
            ops = req.ops.len(),
            ordered = req.options.ordered
        );
        let _enter = span.enter();

        let mut state = RequestState::new();
        state.advance(Phase::Routing);
        let router = match Router::new(req, self.config.max_write_batch_size) {
            Ok(router) => router,
            Err(e) => {
                state.advance(Phase::Finalized);
                return Err(e);
            }
        };
        let routed = match router.route(&req.ops) {
            Ok(routed) => routed,
            Err(e) => {
                state.advance(Phase::Finalized);
                return Err(e);
            }
        };

        state.advance(Phase::Executing);
        let gate = ValidationGate::new(req.options.bypass_document_validation);
        let mut results = ResultAggregator::with_capacity(routed.len());
        BatchExecutor::new(self, gate, req.options.ordered).run(&routed, &mut results);

        state.advance(Phase::Finalized);
        let result = results.finish();
        debug!(
            n_inserted = result.n_inserted,
            n_errors = result.n_errors,
            "bulk write finished"
        );
        Ok(result)
    }

    /// Run a bulk write and expose its results through a cursor.
    pub fn bulk_write(&self, req: &BulkWriteRequest) -> Result<BulkWriteReply, DbError> {
        let result = self.execute_bulk_write(req)?;
        let entries = result
            .results
            .iter()
            .filter(|r| !(req.options.errors_only && r.is_success()))
            .map(OperationResult::to_document)
            .collect();
        let batch_size = req
            .options
            .cursor_batch_size
            .unwrap_or(self.config.default_cursor_batch_size);
        let cursor = self
            .cursors
            .open(BULK_WRITE_CURSOR_NS.to_string(), entries, batch_size)?;

        Ok(BulkWriteReply {
            n_inserted: result.n_inserted,
            n_errors: result.n_errors,
            cursor,
        })
    }
}
