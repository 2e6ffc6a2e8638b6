mod common;
use common::*;

use std::thread;
use std::time::Duration;

use bson::doc;
use docket_db::{BulkWriteRequest, Database, DatabaseConfig, DbError};
use docket_store::MemoryStore;

fn five_inserts() -> BulkWriteRequest {
    (0..5).fold(BulkWriteRequest::new([full_ns(COLL)]), |req, i| {
        req.insert(0, doc! { "_id": i })
    })
}

#[test]
fn get_more_drains_remaining_results() {
    let db = open_db();
    let reply = db.bulk_write(&five_inserts().batch_size(2)).unwrap();
    assert_eq!(reply.cursor.batch.len(), 2);
    let id = reply.cursor.id;
    assert_ne!(id, 0);
    assert!(id > 0);

    let mut seen: Vec<i64> = reply
        .cursor
        .batch
        .iter()
        .map(|d| d.get_i64("idx").unwrap())
        .collect();
    loop {
        let next = db.get_more(id, Some(2)).unwrap();
        seen.extend(next.batch.iter().map(|d| d.get_i64("idx").unwrap()));
        if next.is_exhausted() {
            break;
        }
        assert_eq!(next.id, id);
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    assert_eq!(db.open_cursor_count().unwrap(), 0);
}

#[test]
fn exhausted_cursor_id_is_not_found() {
    let db = open_db();
    let reply = db.bulk_write(&five_inserts().batch_size(1)).unwrap();
    let rest = db.get_more(reply.cursor.id, None).unwrap();
    assert_eq!(rest.batch.len(), 4);
    assert!(rest.is_exhausted());

    let err = db.get_more(reply.cursor.id, None).unwrap_err();
    assert!(matches!(err, DbError::CursorNotFound(id) if id == reply.cursor.id));
    assert_eq!(err.code(), 43);
}

#[test]
fn never_issued_id_is_not_found() {
    let db = open_db();
    assert_eq!(db.get_more(424242, None).unwrap_err().code(), 43);
}

#[test]
fn killed_cursor_is_not_found() {
    let db = open_db();
    let reply = db.bulk_write(&five_inserts().batch_size(1)).unwrap();
    let killed = db.kill_cursors(&[reply.cursor.id]).unwrap();
    assert_eq!(killed.killed, vec![reply.cursor.id]);
    assert!(killed.not_found.is_empty());
    assert_eq!(db.get_more(reply.cursor.id, None).unwrap_err().code(), 43);
}

#[test]
fn default_batch_size_comes_from_config() {
    init_tracing();
    let config = DatabaseConfig {
        default_cursor_batch_size: 3,
        ..config()
    };
    let db = Database::open(MemoryStore::new(), config).unwrap();
    let reply = db.bulk_write(&five_inserts()).unwrap();
    assert_eq!(reply.cursor.batch.len(), 3);
    assert!(!reply.cursor.is_exhausted());
}

#[test]
fn cursors_are_independent() {
    let db = open_db();
    let a = db
        .bulk_write(
            &BulkWriteRequest::new([full_ns(COLL)])
                .insert(0, doc! {})
                .insert(0, doc! {})
                .batch_size(1),
        )
        .unwrap();
    let b = db
        .bulk_write(
            &BulkWriteRequest::new([full_ns(COLL1)])
                .insert(0, doc! {})
                .insert(0, doc! {})
                .batch_size(1),
        )
        .unwrap();
    assert_ne!(a.cursor.id, b.cursor.id);
    assert_eq!(db.open_cursor_count().unwrap(), 2);

    db.kill_cursors(&[a.cursor.id]).unwrap();
    assert_eq!(db.get_more(b.cursor.id, None).unwrap().batch.len(), 1);
}

#[test]
fn idle_cursors_are_reaped() {
    init_tracing();
    let config = DatabaseConfig {
        cursor_timeout_secs: 0,
        ..config()
    };
    let db = Database::open(MemoryStore::new(), config).unwrap();
    let reply = db.bulk_write(&five_inserts().batch_size(1)).unwrap();
    assert_eq!(db.reap_idle_cursors().unwrap(), 1);
    assert_eq!(db.get_more(reply.cursor.id, None).unwrap_err().code(), 43);
}

#[test]
fn background_sweeper_reaps_idle_cursors() {
    init_tracing();
    let config = DatabaseConfig {
        cursor_timeout_secs: 0,
        cursor_sweep_interval_secs: 1,
        ..Default::default()
    };
    let mut db = Database::open(MemoryStore::new(), config).unwrap();
    let reply = db.bulk_write(&five_inserts().batch_size(1)).unwrap();
    assert!(!reply.cursor.is_exhausted());

    let mut remaining = db.open_cursor_count().unwrap();
    for _ in 0..50 {
        if remaining == 0 {
            break;
        }
        thread::sleep(Duration::from_millis(100));
        remaining = db.open_cursor_count().unwrap();
    }
    assert_eq!(remaining, 0);
    db.shutdown();
}
