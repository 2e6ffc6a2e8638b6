#![allow(dead_code)]

use bson::Document;
use docket_db::{CollectionOptions, Database, DatabaseConfig, Namespace};
use docket_store::MemoryStore;

pub const DB: &str = "test";
pub const COLL: &str = "coll";
pub const COLL1: &str = "coll1";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

pub fn config() -> DatabaseConfig {
    DatabaseConfig {
        cursor_sweep_interval_secs: 0,
        ..Default::default()
    }
}

pub fn open_db() -> Database<MemoryStore> {
    init_tracing();
    Database::open(MemoryStore::new(), config()).unwrap()
}

pub fn ns(coll: &str) -> Namespace {
    Namespace::new(DB, coll).unwrap()
}

pub fn full_ns(coll: &str) -> String {
    format!("{DB}.{coll}")
}

pub fn create_with_validator(db: &Database<MemoryStore>, coll: &str, validator: Document) {
    let mut txn = db.begin(false).unwrap();
    txn.create_collection(&ns(coll), &CollectionOptions::with_validator(validator))
        .unwrap();
    txn.commit().unwrap();
}

pub fn count(db: &Database<MemoryStore>, coll: &str) -> u64 {
    db.begin(true).unwrap().count(&ns(coll), None).unwrap()
}

pub fn find_all(db: &Database<MemoryStore>, coll: &str) -> Vec<Document> {
    db.begin(true).unwrap().find(&ns(coll), None).unwrap()
}
