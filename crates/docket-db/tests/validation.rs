mod common;
use common::*;

use bson::doc;
use docket_db::{BulkWriteRequest, CollMod, CollectionOptions, ValidationAction, ValidationLevel};

fn requires_a() -> bson::Document {
    doc! { "a": { "$exists": true } }
}

#[test]
fn validator_rejects_failing_document() {
    let db = open_db();
    create_with_validator(&db, COLL, requires_a());

    let req = BulkWriteRequest::new([full_ns(COLL)]).insert(0, doc! { "_id": 3, "skey": "MongoDB" });
    let result = db.execute_bulk_write(&req).unwrap();
    assert_eq!(result.n_inserted, 0);
    let err = result.results[0].error().unwrap();
    assert_eq!(err.code, 121);
    assert_eq!(err.code_name, "DocumentValidationFailure");
    assert_eq!(count(&db, COLL), 0);
}

#[test]
fn validator_accepts_passing_document() {
    let db = open_db();
    create_with_validator(&db, COLL, requires_a());

    let req = BulkWriteRequest::new([full_ns(COLL)]).insert(0, doc! { "a": 1 });
    assert_eq!(db.execute_bulk_write(&req).unwrap().n_inserted, 1);
}

#[test]
fn bypass_inserts_failing_document() {
    let db = open_db();
    {
        let mut txn = db.begin(false).unwrap();
        txn.insert(&ns(COLL), doc! { "_id": 1 }).unwrap();
        txn.coll_mod(
            &ns(COLL),
            CollMod {
                validator: Some(requires_a()),
                ..Default::default()
            },
        )
        .unwrap();
        txn.commit().unwrap();
    }

    let req = BulkWriteRequest::new([full_ns(COLL)])
        .insert(0, doc! { "_id": 3, "skey": "MongoDB" })
        .bypass_document_validation(true);
    let result = db.execute_bulk_write(&req).unwrap();
    assert_eq!(result.n_inserted, 1);

    let txn = db.begin(true).unwrap();
    assert_eq!(txn.count(&ns(COLL), Some(&doc! { "_id": 3 })).unwrap(), 1);
}

#[test]
fn validation_gate_applies_per_target_collection() {
    let db = open_db();
    create_with_validator(&db, COLL, requires_a());

    let req = BulkWriteRequest::new([full_ns(COLL), full_ns(COLL1)])
        .insert(0, doc! { "b": 1 })
        .insert(1, doc! { "b": 1 })
        .ordered(false);
    let result = db.execute_bulk_write(&req).unwrap();
    assert!(!result.results[0].is_success());
    assert!(result.results[1].is_success());
}

#[test]
fn warn_action_inserts_failing_document() {
    let db = open_db();
    let mut txn = db.begin(false).unwrap();
    txn.create_collection(
        &ns(COLL),
        &CollectionOptions {
            validator: Some(requires_a()),
            validation_action: ValidationAction::Warn,
            ..Default::default()
        },
    )
    .unwrap();
    txn.commit().unwrap();

    let req = BulkWriteRequest::new([full_ns(COLL)]).insert(0, doc! { "b": 1 });
    let result = db.execute_bulk_write(&req).unwrap();
    assert_eq!(result.n_inserted, 1);
    assert_eq!(result.n_errors, 0);
}

#[test]
fn level_off_disables_validation() {
    let db = open_db();
    create_with_validator(&db, COLL, requires_a());
    let mut txn = db.begin(false).unwrap();
    let options = txn
        .coll_mod(
            &ns(COLL),
            CollMod {
                validation_level: Some(ValidationLevel::Off),
                ..Default::default()
            },
        )
        .unwrap();
    txn.commit().unwrap();
    assert!(options.validator.is_some());

    let req = BulkWriteRequest::new([full_ns(COLL)]).insert(0, doc! { "b": 1 });
    assert_eq!(db.execute_bulk_write(&req).unwrap().n_inserted, 1);
}

#[test]
fn validator_sees_nested_fields_and_operators() {
    let db = open_db();
    create_with_validator(
        &db,
        COLL,
        doc! {
            "profile.age": { "$gte": 18 },
            "$or": [{ "role": "admin" }, { "tags": "trusted" }],
        },
    );

    let req = BulkWriteRequest::new([full_ns(COLL)])
        .insert(0, doc! { "profile": { "age": 30 }, "role": "admin" })
        .insert(0, doc! { "profile": { "age": 30 }, "tags": ["new", "trusted"] })
        .insert(0, doc! { "profile": { "age": 12 }, "role": "admin" })
        .insert(0, doc! { "profile": { "age": 30 }, "role": "guest" })
        .ordered(false);
    let result = db.execute_bulk_write(&req).unwrap();
    let ok: Vec<bool> = result.results.iter().map(|r| r.is_success()).collect();
    assert_eq!(ok, vec![true, true, false, false]);
}

#[test]
fn transaction_insert_enforces_validator() {
    let db = open_db();
    create_with_validator(&db, COLL, requires_a());

    let mut txn = db.begin(false).unwrap();
    let err = txn.insert(&ns(COLL), doc! { "b": 1 }).unwrap_err();
    assert_eq!(err.code(), 121);
}

#[test]
fn invalid_validator_is_rejected_when_set() {
    let db = open_db();
    let mut txn = db.begin(false).unwrap();
    let err = txn
        .create_collection(&ns(COLL), &CollectionOptions::with_validator(doc! { "a": { "$near": 1 } }))
        .unwrap_err();
    assert_eq!(err.code(), 2);
}
