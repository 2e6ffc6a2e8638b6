use bson::{Bson, Document};

use crate::args;
use crate::error::DbError;

/// A single write in a bulk request. `target` indexes the request's `nsInfo`.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Insert { target: i64, document: Document },
}

impl Operation {
    pub fn insert(target: i64, document: Document) -> Self {
        Operation::Insert { target, document }
    }

    pub fn target(&self) -> i64 {
        match self {
            Operation::Insert { target, .. } => *target,
        }
    }

    fn from_bson(idx: usize, value: &Bson) -> Result<Self, DbError> {
        let field = format!("bulkWrite.ops.{idx}");
        let entry = args::document(&field, value)?;

        let mut target = None;
        let mut document = None;
        for (key, value) in entry {
            match key.as_str() {
                "insert" => target = Some(args::int(&format!("{field}.insert"), value)?),
                "document" => {
                    document = Some(args::document(&format!("{field}.document"), value)?.clone())
                }
                "update" | "delete" => {
                    return Err(DbError::FailedToParse(format!(
                        "BulkWrite ops entry {idx} is a '{key}' operation, which is not supported"
                    )));
                }
                other => return Err(args::unknown(&field, other)),
            }
        }

        match (target, document) {
            (Some(target), Some(document)) => Ok(Operation::Insert { target, document }),
            (None, _) => Err(DbError::FailedToParse(format!(
                "BulkWrite ops entry {idx} does not name an operation"
            ))),
            (Some(_), None) => Err(args::missing(&format!("{field}.document"))),
        }
    }
}

/// Target namespace of one or more operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub ns: String,
}

impl NamespaceInfo {
    pub fn new(ns: impl Into<String>) -> Self {
        Self { ns: ns.into() }
    }

    fn from_bson(idx: usize, value: &Bson) -> Result<Self, DbError> {
        let field = format!("bulkWrite.nsInfo.{idx}");
        let entry = args::document(&field, value)?;
        let mut ns = None;
        for (key, value) in entry {
            match key.as_str() {
                "ns" => ns = Some(args::string(&format!("{field}.ns"), value)?.to_string()),
                other => return Err(args::unknown(&field, other)),
            }
        }
        let ns = ns.ok_or_else(|| args::missing(&format!("{field}.ns")))?;
        Ok(Self { ns })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkWriteOptions {
    /// Stop at the first failed operation.
    pub ordered: bool,
    pub bypass_document_validation: bool,
    /// Report only failed operations in the result cursor.
    pub errors_only: bool,
    /// First batch size of the result cursor. `None` uses the database default.
    pub cursor_batch_size: Option<usize>,
}

impl Default for BulkWriteOptions {
    fn default() -> Self {
        Self {
            ordered: true,
            bypass_document_validation: false,
            errors_only: false,
            cursor_batch_size: None,
        }
    }
}

/// A decoded `bulkWrite` command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteRequest {
    pub ops: Vec<Operation>,
    pub ns_info: Vec<NamespaceInfo>,
    pub options: BulkWriteOptions,
}

impl BulkWriteRequest {
    /// Start a request over the given namespaces, in `nsInfo` order.
    pub fn new<I, T>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            ops: Vec::new(),
            ns_info: namespaces.into_iter().map(NamespaceInfo::new).collect(),
            options: BulkWriteOptions::default(),
        }
    }

    pub fn insert(mut self, target: i64, document: Document) -> Self {
        self.ops.push(Operation::insert(target, document));
        self
    }

    pub fn ordered(mut self, ordered: bool) -> Self {
        self.options.ordered = ordered;
        self
    }

    pub fn bypass_document_validation(mut self, bypass: bool) -> Self {
        self.options.bypass_document_validation = bypass;
        self
    }

    pub fn errors_only(mut self, errors_only: bool) -> Self {
        self.options.errors_only = errors_only;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.options.cursor_batch_size = Some(batch_size);
        self
    }

    /// Decode the body of a `bulkWrite` command document.
    ///
    /// Only structure is checked here. Namespace strings and op indexes are
    /// resolved by the router.
    pub fn from_command(cmd: &Document) -> Result<Self, DbError> {
        let mut ops = None;
        let mut ns_info = None;
        let mut options = BulkWriteOptions::default();

        for (key, value) in cmd {
            match key.as_str() {
                "bulkWrite" => {}
                "ops" => {
                    let entries = args::array("bulkWrite.ops", value)?;
                    ops = Some(
                        entries
                            .iter()
                            .enumerate()
                            .map(|(i, v)| Operation::from_bson(i, v))
                            .collect::<Result<Vec<_>, _>>()?,
                    );
                }
                "nsInfo" => {
                    let entries = args::array("bulkWrite.nsInfo", value)?;
                    ns_info = Some(
                        entries
                            .iter()
                            .enumerate()
                            .map(|(i, v)| NamespaceInfo::from_bson(i, v))
                            .collect::<Result<Vec<_>, _>>()?,
                    );
                }
                "ordered" => options.ordered = args::boolean("bulkWrite.ordered", value)?,
                "bypassDocumentValidation" => {
                    options.bypass_document_validation =
                        args::boolean("bulkWrite.bypassDocumentValidation", value)?
                }
                "errorsOnly" => options.errors_only = args::boolean("bulkWrite.errorsOnly", value)?,
                "cursor" => options.cursor_batch_size = parse_cursor_options(value)?,
                other if args::is_generic(other) => {}
                other => return Err(args::unknown("bulkWrite", other)),
            }
        }

        Ok(Self {
            ops: ops.ok_or_else(|| args::missing("bulkWrite.ops"))?,
            ns_info: ns_info.ok_or_else(|| args::missing("bulkWrite.nsInfo"))?,
            options,
        })
    }
}

fn parse_cursor_options(value: &Bson) -> Result<Option<usize>, DbError> {
    let cursor = args::document("bulkWrite.cursor", value)?;
    let mut batch_size = None;
    for (key, value) in cursor {
        match key.as_str() {
            "batchSize" => batch_size = Some(args::count("bulkWrite.cursor.batchSize", value)?),
            other => return Err(args::unknown("bulkWrite.cursor", other)),
        }
    }
    Ok(batch_size)
}
