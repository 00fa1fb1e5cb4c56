//! Performance benchmarks for the announcement feed.

use bulletin::{
    build_query, AnnouncementStore, Building, NewAnnouncement, Store, StoreConfig, ViewerSession,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tempfile::TempDir;

const BUILDINGS: [&str; 4] = ["D102", "B7", "C3", "ALL"];

fn notice(i: usize) -> NewAnnouncement {
    NewAnnouncement::new(
        format!("notice {i}"),
        "details",
        Building::target_or_all(BUILDINGS[i % BUILDINGS.len()]),
    )
}

/// Benchmark append throughput, memory-only and file-backed
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    group.bench_function("memory", |b| {
        let store = Store::in_memory();
        let mut i = 0;
        b.iter(|| {
            i += 1;
            black_box(store.append(notice(i)).unwrap());
        });
    });

    group.bench_function("file_backed", |b| {
        let dir = TempDir::new().unwrap();
        let store = Store::create(StoreConfig {
            sync_interval: 100,
            ..StoreConfig::at(dir.path().join("store"))
        })
        .unwrap();
        let mut i = 0;
        b.iter(|| {
            i += 1;
            black_box(store.append(notice(i)).unwrap());
        });
    });

    group.finish();
}

/// Benchmark snapshot fan-out with varying numbers of viewers
fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");

    for viewers in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::new("viewers", viewers), &viewers, |b, &n| {
            let store = Arc::new(Store::in_memory());
            for i in 0..200 {
                store.append(notice(i)).unwrap();
            }

            let sessions: Vec<_> = (0..n)
                .map(|i| {
                    let session = ViewerSession::new(store.clone());
                    session.set_filter(BUILDINGS[i % 3]).unwrap();
                    session
                })
                .collect();

            let mut i = 200;
            b.iter(|| {
                i += 1;
                store.append(notice(i)).unwrap();
                for session in &sessions {
                    black_box(session.poll());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark one-shot query selection over a populated store
fn bench_query(c: &mut Criterion) {
    let store = Store::in_memory();
    for i in 0..5_000 {
        store.append(notice(i)).unwrap();
    }
    let query = build_query("d102").unwrap();

    c.bench_function("query_5000", |b| {
        b.iter(|| black_box(store.query(&query)));
    });
}

criterion_group!(benches, bench_append, bench_fanout, bench_query);

criterion_main!(benches);
