mod args;
pub mod bulk;
mod catalog;
mod command;
mod config;
mod cursor;
mod database;
mod encoding;
mod error;
mod namespace;
mod validation;

pub use bson::{Bson, Document};
pub use bulk::{
    BULK_WRITE_CURSOR_NS, BulkWriteOptions, BulkWriteReply, BulkWriteRequest, BulkWriteResult,
    NamespaceInfo, Operation, OperationResult, OperationStatus,
};
pub use catalog::{CollMod, CollectionOptions, ValidationAction, ValidationLevel};
pub use command::error_reply;
pub use config::DatabaseConfig;
pub use cursor::{BatchKind, CursorReply, KillCursorsResult};
pub use database::{Database, DatabaseTransaction};
pub use error::{DbError, ErrorInfo};
pub use namespace::Namespace;
