use bson::doc;
use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use docket_db::{BulkWriteRequest, CollectionOptions, Database, DatabaseConfig, Namespace};
use docket_store::MemoryStore;

fn new_db() -> Database<MemoryStore> {
    let config = DatabaseConfig {
        cursor_sweep_interval_secs: 0,
        ..Default::default()
    };
    Database::open(MemoryStore::new(), config).unwrap()
}

fn request(n: usize) -> BulkWriteRequest {
    (0..n).fold(
        BulkWriteRequest::new(["bench.a", "bench.b"]),
        |req, i| {
            req.insert(
                (i % 2) as i64,
                doc! { "name": format!("user-{i}"), "age": (i % 90) as i32, "tags": ["x", "y"] },
            )
        },
    )
}

// ── Insert ──────────────────────────────────────────────────

fn bench_bulk_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_write/insert");
    for n in [100, 1_000] {
        let req = request(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter_batched(
                new_db,
                |db| db.execute_bulk_write(&req).unwrap(),
                BatchSize::PerIteration,
            )
        });
    }
    group.finish();
}

fn bench_bulk_insert_validated(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_write/insert_validated");
    for n in [100, 1_000] {
        let req = request(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter_batched(
                || {
                    let db = new_db();
                    let mut txn = db.begin(false).unwrap();
                    for coll in ["a", "b"] {
                        let ns = Namespace::new("bench", coll).unwrap();
                        let options = CollectionOptions::with_validator(
                            doc! { "name": { "$type": "string" }, "age": { "$gte": 0 } },
                        );
                        txn.create_collection(&ns, &options).unwrap();
                    }
                    txn.commit().unwrap();
                    db
                },
                |db| db.execute_bulk_write(&req).unwrap(),
                BatchSize::PerIteration,
            )
        });
    }
    group.finish();
}

// ── Cursor ──────────────────────────────────────────────────

fn bench_drain_cursor(c: &mut Criterion) {
    let req = request(1_000).batch_size(10);
    c.bench_function("bulk_write/drain_cursor", |b| {
        b.iter_batched(
            || {
                let db = new_db();
                let id = db.bulk_write(&req).unwrap().cursor.id;
                (db, id)
            },
            |(db, id)| {
                let mut id = id;
                while id != 0 {
                    id = db.get_more(id, Some(10)).unwrap().id;
                }
            },
            BatchSize::PerIteration,
        )
    });
}

criterion_group!(
    benches,
    bench_bulk_insert,
    bench_bulk_insert_validated,
    bench_drain_cursor
);
criterion_main!(benches);
