use bson::{Document, doc};

use crate::cursor::CursorReply;
use crate::error::{DbError, ErrorInfo};

#[derive(Debug, Clone, PartialEq)]
pub enum OperationStatus {
    Success,
    Error(ErrorInfo),
    /// Skipped because an earlier operation of an ordered request failed.
    NotAttempted,
}

/// Outcome of one operation, keyed by its position in `ops`.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    pub index: usize,
    pub status: OperationStatus,
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, OperationStatus::Success)
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match &self.status {
            OperationStatus::Error(info) => Some(info),
            _ => None,
        }
    }

    /// Cursor entry for this operation.
    pub fn to_document(&self) -> Document {
        let idx = self.index as i64;
        match &self.status {
            OperationStatus::Success => doc! { "ok": 1.0, "idx": idx, "n": 1 },
            OperationStatus::Error(info) => doc! {
                "ok": 0.0,
                "idx": idx,
                "code": info.code,
                "codeName": info.code_name,
                "errmsg": info.errmsg.as_str(),
            },
            OperationStatus::NotAttempted => doc! { "ok": 0.0, "idx": idx, "notAttempted": true },
        }
    }
}

/// Final outcome of a bulk write, before it is exposed through a cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteResult {
    /// One entry per operation, in execution order.
    pub results: Vec<OperationResult>,
    pub n_inserted: u64,
    pub n_errors: u64,
}

impl BulkWriteResult {
    pub fn has_errors(&self) -> bool {
        self.n_errors > 0
    }
}

/// Collects per-operation outcomes as the executor produces them.
#[derive(Debug, Default)]
pub(crate) struct ResultAggregator {
    results: Vec<OperationResult>,
    n_inserted: u64,
    n_errors: u64,
}

impl ResultAggregator {
    pub(crate) fn with_capacity(n: usize) -> Self {
        Self {
            results: Vec::with_capacity(n),
            ..Default::default()
        }
    }

    pub(crate) fn record(&mut self, index: usize, outcome: Result<(), DbError>) {
        let status = match outcome {
            Ok(()) => {
                self.n_inserted += 1;
                OperationStatus::Success
            }
            Err(e) => {
                self.n_errors += 1;
                OperationStatus::Error(ErrorInfo::from(&e))
            }
        };
        self.results.push(OperationResult { index, status });
    }

    pub(crate) fn skip(&mut self, index: usize) {
        self.results.push(OperationResult {
            index,
            status: OperationStatus::NotAttempted,
        });
    }

    pub(crate) fn finish(self) -> BulkWriteResult {
        BulkWriteResult {
            results: self.results,
            n_inserted: self.n_inserted,
            n_errors: self.n_errors,
        }
    }
}

/// Command-level reply of `bulkWrite`.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkWriteReply {
    pub n_inserted: u64,
    pub n_errors: u64,
    pub cursor: CursorReply,
}

impl BulkWriteReply {
    pub fn to_document(&self) -> Document {
        doc! {
            "ok": 1.0,
            "cursor": self.cursor.to_document(),
            "nErrors": self.n_errors as i64,
            "nInserted": self.n_inserted as i64,
            "nMatched": 0_i64,
            "nModified": 0_i64,
            "nUpserted": 0_i64,
            "nDeleted": 0_i64,
        }
    }
}
