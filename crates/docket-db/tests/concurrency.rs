mod common;
use common::*;

use std::sync::Arc;
use std::thread;

use bson::doc;
use docket_db::BulkWriteRequest;

#[test]
fn concurrent_bulk_writes_all_land() {
    let db = Arc::new(open_db());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                let req = (0..25).fold(
                    BulkWriteRequest::new([full_ns(COLL), full_ns(COLL1)]),
                    |req, i| req.insert(i % 2, doc! { "t": t, "i": i }),
                );
                db.execute_bulk_write(&req).unwrap()
            })
        })
        .collect();

    let mut total = 0;
    for h in handles {
        let result = h.join().unwrap();
        assert_eq!(result.n_errors, 0);
        total += result.n_inserted;
    }
    assert_eq!(total, 200);
    assert_eq!(count(&db, COLL) + count(&db, COLL1), 200);
}

#[test]
fn racing_duplicate_ids_insert_exactly_once() {
    let db = Arc::new(open_db());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                let req = BulkWriteRequest::new([full_ns(COLL)])
                    .insert(0, doc! { "_id": "shared" })
                    .ordered(false);
                db.execute_bulk_write(&req).unwrap().n_inserted
            })
        })
        .collect();

    let inserted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(inserted, 1);
    assert_eq!(count(&db, COLL), 1);
}

#[test]
fn readers_see_committed_operations_only() {
    let db = Arc::new(open_db());
    let writer = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for i in 0..50 {
                let req = BulkWriteRequest::new([full_ns(COLL)]).insert(0, doc! { "_id": i });
                db.execute_bulk_write(&req).unwrap();
            }
        })
    };

    let mut last = 0;
    while !writer.is_finished() {
        let n = count(&db, COLL);
        assert!(n >= last);
        last = n;
    }
    writer.join().unwrap();
    assert_eq!(count(&db, COLL), 50);
}

#[test]
fn read_transaction_keeps_collection_dropped_after_begin() {
    let db = open_db();
    let req = BulkWriteRequest::new([full_ns(COLL), full_ns(COLL1)])
        .insert(0, doc! { "_id": 1 })
        .insert(1, doc! { "_id": 1 });
    db.execute_bulk_write(&req).unwrap();

    let reader = db.begin(true).unwrap();

    let mut txn = db.begin(false).unwrap();
    txn.drop_collection(&ns(COLL)).unwrap();
    txn.insert(&ns(COLL1), doc! { "_id": 2 }).unwrap();
    txn.commit().unwrap();

    assert_eq!(reader.count(&ns(COLL), None).unwrap(), 1);
    assert_eq!(reader.count(&ns(COLL1), None).unwrap(), 1);
    assert_eq!(count(&db, COLL), 0);
    assert_eq!(count(&db, COLL1), 2);
}

#[test]
fn count_never_fails_while_collection_is_dropped() {
    let db = Arc::new(open_db());
    let writer = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for i in 0..200 {
                let req = BulkWriteRequest::new([full_ns(COLL)]).insert(0, doc! { "_id": i });
                db.execute_bulk_write(&req).unwrap();
                let reply = db.run_command(DB, &doc! { "drop": COLL });
                assert_eq!(reply.get_f64("ok").unwrap(), 1.0);
            }
        })
    };

    let mut failures = Vec::new();
    while !writer.is_finished() {
        let reply = db.run_command(DB, &doc! { "count": COLL });
        if reply.get_f64("ok").unwrap() != 1.0 {
            failures.push(reply);
            continue;
        }
        assert!(reply.get_i64("n").unwrap() <= 1);
    }
    writer.join().unwrap();
    assert!(failures.is_empty(), "{failures:?}");
}
