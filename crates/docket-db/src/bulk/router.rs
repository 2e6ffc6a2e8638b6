use bson::Document;

use super::request::{BulkWriteRequest, Operation};
use crate::error::DbError;
use crate::namespace::Namespace;

/// An operation resolved against `nsInfo`.
#[derive(Debug)]
pub(crate) struct RoutedOp<'r> {
    pub(crate) index: usize,
    pub(crate) ns: &'r Namespace,
    pub(crate) document: &'r Document,
}

/// Resolves operation targets to namespaces before anything is written.
pub(crate) struct Router {
    namespaces: Vec<Namespace>,
}

impl Router {
    pub(crate) fn new(req: &BulkWriteRequest, max_ops: usize) -> Result<Self, DbError> {
        if req.ops.is_empty() || req.ops.len() > max_ops {
            return Err(DbError::InvalidLength(format!(
                "Write batch sizes must be between 1 and {max_ops}. Got {} operations.",
                req.ops.len()
            )));
        }
        if req.ns_info.is_empty() {
            return Err(DbError::InvalidLength(
                "BulkWrite nsInfo must contain at least one namespace".into(),
            ));
        }
        let namespaces = req
            .ns_info
            .iter()
            .map(|info| Namespace::parse(&info.ns))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { namespaces })
    }

    /// Resolve every op in input order. Any out-of-range index fails the whole request.
    pub(crate) fn route<'r>(&'r self, ops: &'r [Operation]) -> Result<Vec<RoutedOp<'r>>, DbError> {
        ops.iter()
            .enumerate()
            .map(|(index, op)| match op {
                Operation::Insert { target, document } => Ok(RoutedOp {
                    index,
                    ns: self.resolve(index, *target)?,
                    document,
                }),
            })
            .collect()
    }

    fn resolve(&self, index: usize, target: i64) -> Result<&Namespace, DbError> {
        usize::try_from(target)
            .ok()
            .and_then(|t| self.namespaces.get(t))
            .ok_or(DbError::InvalidNamespaceIndex {
                op_index: index,
                ns_index: target,
                ns_count: self.namespaces.len(),
            })
    }
}
