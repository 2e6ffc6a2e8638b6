use bson::{Bson, Document, doc};
use docket_store::Store;
use tracing::debug;

use crate::args;
use crate::bulk::{BULK_WRITE_CURSOR_NS, BulkWriteRequest, NamespaceInfo, OperationStatus};
use crate::catalog::{CollMod, CollectionOptions, ValidationAction, ValidationLevel};
use crate::database::Database;
use crate::error::{DbError, ErrorInfo};
use crate::namespace::Namespace;

/// Reply for a failed command.
pub fn error_reply(e: &DbError) -> Document {
    let info = ErrorInfo::from(e);
    doc! {
        "ok": 0.0,
        "errmsg": info.errmsg,
        "code": info.code,
        "codeName": info.code_name,
    }
}

impl<S: Store> Database<S> {
    /// Run an administrative command against database `db`.
    ///
    /// The command name is the first field of `cmd`. Failures are reported
    /// in the reply as `{ok: 0.0, errmsg, code, codeName}`.
    pub fn run_command(&self, db: &str, cmd: &Document) -> Document {
        let name = cmd.keys().next().map(String::as_str).unwrap_or_default();
        match self.dispatch(db, name, cmd) {
            Ok(reply) => reply,
            Err(e) => {
                debug!(command = name, db, error = %e, "command failed");
                error_reply(&e)
            }
        }
    }

    fn dispatch(&self, db: &str, name: &str, cmd: &Document) -> Result<Document, DbError> {
        match name {
            "bulkWrite" => {
                if db != "admin" {
                    return Err(DbError::AdminOnly("bulkWrite"));
                }
                let req = BulkWriteRequest::from_command(cmd)?;
                Ok(self.bulk_write(&req)?.to_document())
            }
            "getMore" => self.cmd_get_more(cmd),
            "killCursors" => self.cmd_kill_cursors(cmd),
            "insert" => self.cmd_insert(db, cmd),
            "create" => self.cmd_create(db, cmd),
            "collMod" => self.cmd_coll_mod(db, cmd),
            "drop" => self.cmd_drop(db, cmd),
            "count" => self.cmd_count(db, cmd),
            "listCollections" => self.cmd_list_collections(db, cmd),
            other => Err(DbError::CommandNotFound(other.to_string())),
        }
    }

    fn cmd_get_more(&self, cmd: &Document) -> Result<Document, DbError> {
        let mut id = None;
        let mut batch_size = None;
        for (key, value) in cmd {
            match key.as_str() {
                "getMore" => id = Some(args::int("getMore.getMore", value)?),
                "collection" => {
                    args::string("getMore.collection", value)?;
                }
                "batchSize" => batch_size = Some(args::count("getMore.batchSize", value)?),
                other if args::is_generic(other) => {}
                other => return Err(args::unknown("getMore", other)),
            }
        }
        let id = id.ok_or_else(|| args::missing("getMore.getMore"))?;
        let reply = self.get_more(id, batch_size)?;
        Ok(doc! { "cursor": reply.to_document(), "ok": 1.0 })
    }

    fn cmd_kill_cursors(&self, cmd: &Document) -> Result<Document, DbError> {
        let mut ids = None;
        for (key, value) in cmd {
            match key.as_str() {
                "killCursors" => {
                    args::string("killCursors.killCursors", value)?;
                }
                "cursors" => {
                    ids = Some(
                        args::array("killCursors.cursors", value)?
                            .iter()
                            .map(|v| args::int("killCursors.cursors", v))
                            .collect::<Result<Vec<_>, _>>()?,
                    );
                }
                other if args::is_generic(other) => {}
                other => return Err(args::unknown("killCursors", other)),
            }
        }
        let ids = ids.ok_or_else(|| args::missing("killCursors.cursors"))?;
        let result = self.kill_cursors(&ids)?;
        Ok(doc! {
            "cursorsKilled": result.killed,
            "cursorsNotFound": result.not_found,
            "cursorsAlive": [],
            "cursorsUnknown": [],
            "ok": 1.0,
        })
    }

    /// `insert` runs through the bulk write engine with a single namespace.
    fn cmd_insert(&self, db: &str, cmd: &Document) -> Result<Document, DbError> {
        let mut ns = None;
        let mut documents = None;
        let mut req = BulkWriteRequest::default();
        for (key, value) in cmd {
            match key.as_str() {
                "insert" => ns = Some(Namespace::new(db, args::string("insert.insert", value)?)?),
                "documents" => documents = Some(args::array("insert.documents", value)?),
                "ordered" => req.options.ordered = args::boolean("insert.ordered", value)?,
                "bypassDocumentValidation" => {
                    req.options.bypass_document_validation =
                        args::boolean("insert.bypassDocumentValidation", value)?
                }
                other if args::is_generic(other) => {}
                other => return Err(args::unknown("insert", other)),
            }
        }
        let ns = ns.ok_or_else(|| args::missing("insert.insert"))?;
        let documents = documents.ok_or_else(|| args::missing("insert.documents"))?;

        req = documents
            .iter()
            .enumerate()
            .try_fold(req, |req, (i, value)| {
                let doc = args::document(&format!("insert.documents.{i}"), value)?;
                Ok::<_, DbError>(req.insert(0, doc.clone()))
            })?;
        req.ns_info.push(NamespaceInfo::new(ns.to_string()));

        let result = self.execute_bulk_write(&req)?;
        let mut reply = doc! { "n": result.n_inserted as i64 };
        let write_errors: Vec<Document> = result
            .results
            .iter()
            .filter_map(|r| match &r.status {
                OperationStatus::Error(info) => Some(doc! {
                    "index": r.index as i64,
                    "code": info.code,
                    "errmsg": info.errmsg.as_str(),
                }),
                _ => None,
            })
            .collect();
        if !write_errors.is_empty() {
            reply.insert("writeErrors", write_errors);
        }
        reply.insert("ok", 1.0);
        Ok(reply)
    }

    fn cmd_create(&self, db: &str, cmd: &Document) -> Result<Document, DbError> {
        let (coll, update) = parse_validation_command("create", cmd)?;
        let ns = Namespace::new(db, coll)?;
        let options = CollectionOptions {
            validator: update.validator.filter(|v| !v.is_empty()),
            validation_level: update.validation_level.unwrap_or_default(),
            validation_action: update.validation_action.unwrap_or_default(),
        };

        let mut txn = self.begin(false)?;
        txn.create_collection(&ns, &options)?;
        txn.commit()?;
        Ok(doc! { "ok": 1.0 })
    }

    fn cmd_coll_mod(&self, db: &str, cmd: &Document) -> Result<Document, DbError> {
        let (coll, update) = parse_validation_command("collMod", cmd)?;
        let ns = Namespace::new(db, coll)?;

        let mut txn = self.begin(false)?;
        txn.coll_mod(&ns, update)?;
        txn.commit()?;
        Ok(doc! { "ok": 1.0 })
    }

    fn cmd_drop(&self, db: &str, cmd: &Document) -> Result<Document, DbError> {
        let mut coll = None;
        for (key, value) in cmd {
            match key.as_str() {
                "drop" => coll = Some(args::string("drop.drop", value)?),
                other if args::is_generic(other) => {}
                other => return Err(args::unknown("drop", other)),
            }
        }
        let ns = Namespace::new(db, coll.ok_or_else(|| args::missing("drop.drop"))?)?;

        let mut txn = self.begin(false)?;
        txn.drop_collection(&ns)?;
        txn.commit()?;
        Ok(doc! { "ns": ns.to_string(), "ok": 1.0 })
    }

    fn cmd_count(&self, db: &str, cmd: &Document) -> Result<Document, DbError> {
        let mut coll = None;
        let mut query = None;
        let mut skip = 0;
        let mut limit = 0;
        for (key, value) in cmd {
            match key.as_str() {
                "count" => coll = Some(args::string("count.count", value)?),
                "query" => query = Some(args::document("count.query", value)?),
                "skip" => skip = args::count("count.skip", value)?,
                // A negative limit counts the same as a positive one.
                "limit" => limit = args::int("count.limit", value)?.unsigned_abs(),
                other if args::is_generic(other) => {}
                other => return Err(args::unknown("count", other)),
            }
        }
        let ns = Namespace::new(db, coll.ok_or_else(|| args::missing("count.count"))?)?;

        let txn = self.begin(true)?;
        let mut n = txn.count(&ns, query)?.saturating_sub(skip as u64);
        if limit > 0 {
            n = n.min(limit);
        }
        Ok(doc! { "n": n as i64, "ok": 1.0 })
    }

    fn cmd_list_collections(&self, db: &str, cmd: &Document) -> Result<Document, DbError> {
        let mut name_only = false;
        for (key, value) in cmd {
            match key.as_str() {
                "listCollections" => {}
                "nameOnly" => name_only = args::boolean("listCollections.nameOnly", value)?,
                other if args::is_generic(other) => {}
                other => return Err(args::unknown("listCollections", other)),
            }
        }

        let txn = self.begin(true)?;
        let mut batch = Vec::new();
        for coll in txn.list_collections(db)? {
            let ns = Namespace::new(db, coll.as_str())?;
            let mut entry = doc! { "name": coll, "type": "collection" };
            if !name_only {
                entry.insert("options", options_document(txn.collection_options(&ns)?));
            }
            batch.push(entry);
        }
        Ok(doc! {
            "cursor": {
                "id": 0_i64,
                "ns": format!("{db}.$cmd.listCollections"),
                "firstBatch": batch,
            },
            "ok": 1.0,
        })
    }
}

/// Parse the fields shared by `create` and `collMod`.
fn parse_validation_command<'a>(
    command: &str,
    cmd: &'a Document,
) -> Result<(&'a str, CollMod), DbError> {
    let mut coll = None;
    let mut update = CollMod::default();
    for (key, value) in cmd {
        let field = format!("{command}.{key}");
        match key.as_str() {
            k if k == command => coll = Some(args::string(&field, value)?),
            "validator" => update.validator = Some(args::document(&field, value)?.clone()),
            "validationLevel" => {
                update.validation_level = Some(args::string(&field, value)?.parse::<ValidationLevel>()?)
            }
            "validationAction" => {
                update.validation_action =
                    Some(args::string(&field, value)?.parse::<ValidationAction>()?)
            }
            other if args::is_generic(other) => {}
            other => return Err(args::unknown(command, other)),
        }
    }
    let coll = coll.ok_or_else(|| args::missing(&format!("{command}.{command}")))?;
    Ok((coll, update))
}

fn options_document(options: Option<CollectionOptions>) -> Bson {
    let mut doc = Document::new();
    if let Some(options) = options {
        if let Some(validator) = options.validator {
            doc.insert("validator", validator);
            doc.insert("validationLevel", options.validation_level.as_str());
            doc.insert("validationAction", options.validation_action.as_str());
        }
    }
    Bson::Document(doc)
}
