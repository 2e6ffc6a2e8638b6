use bson::Bson;
use docket_query::FilterParseError;
use docket_store::StoreError;

/// Errors raised by the database layer.
///
/// Every variant maps onto a MongoDB server error code (see [`DbError::code`])
/// so command replies carry the same `code` / `codeName` pair a driver expects.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("bson error: {0}")]
    Bson(#[from] bson::error::Error),
    #[error("{0}")]
    Filter(#[from] FilterParseError),
    #[error("{0}")]
    FailedToParse(String),
    #[error("{0}")]
    BadValue(String),
    #[error("{0}")]
    InvalidLength(String),
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
    #[error("BulkWrite ops entry {op_index} has an invalid nsInfo index {ns_index} (nsInfo has {ns_count} entries)")]
    InvalidNamespaceIndex {
        op_index: usize,
        ns_index: i64,
        ns_count: usize,
    },
    #[error("Document failed validation")]
    DocumentValidationFailure { ns: String },
    #[error("E11000 duplicate key error collection: {ns} index: _id_ dup key: {{ _id: {id} }}")]
    DuplicateKey { ns: String, id: Bson },
    #[error("ns does not exist: {0}")]
    NamespaceNotFound(String),
    #[error("Collection already exists. NS: {0}")]
    NamespaceExists(String),
    #[error("cursor id {0} not found")]
    CursorNotFound(i64),
    #[error("no such command: '{0}'")]
    CommandNotFound(String),
    #[error("{0} may only be run against the admin database.")]
    AdminOnly(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DbError {
    /// MongoDB numeric error code.
    pub fn code(&self) -> i32 {
        match self {
            DbError::Store(_) | DbError::Bson(_) | DbError::Internal(_) => 1,
            DbError::Filter(_) | DbError::BadValue(_) | DbError::InvalidNamespaceIndex { .. } => 2,
            DbError::FailedToParse(_) => 9,
            DbError::AdminOnly(_) => 13,
            DbError::InvalidLength(_) => 16,
            DbError::NamespaceNotFound(_) => 26,
            DbError::CursorNotFound(_) => 43,
            DbError::NamespaceExists(_) => 48,
            DbError::CommandNotFound(_) => 59,
            DbError::InvalidNamespace(_) => 73,
            DbError::DocumentValidationFailure { .. } => 121,
            DbError::DuplicateKey { .. } => 11000,
        }
    }

    /// MongoDB error code name.
    pub fn code_name(&self) -> &'static str {
        match self.code() {
            2 => "BadValue",
            9 => "FailedToParse",
            13 => "Unauthorized",
            16 => "InvalidLength",
            26 => "NamespaceNotFound",
            43 => "CursorNotFound",
            48 => "NamespaceExists",
            59 => "CommandNotFound",
            73 => "InvalidNamespace",
            121 => "DocumentValidationFailure",
            11000 => "DuplicateKey",
            _ => "InternalError",
        }
    }
}

/// Error details attached to a failed operation or command reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub code: i32,
    pub code_name: &'static str,
    pub errmsg: String,
}

impl From<&DbError> for ErrorInfo {
    fn from(e: &DbError) -> Self {
        Self {
            code: e.code(),
            code_name: e.code_name(),
            errmsg: e.to_string(),
        }
    }
}
