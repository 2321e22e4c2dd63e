//! # Engine Benchmarks
//!
//! Performance benchmarks for the progression engine hot paths.
//!
//! Run with: `cargo bench -p kinship-core`

#![allow(clippy::unwrap_used)]

use criterion::{Criterion, criterion_group, criterion_main};
use kinship_core::{
    ActivitySnapshot, MemoryStore, PartyId, ProgressionEngine, RecordedMetrics, RelationshipId,
    RequirementId, StoreBackend,
};
use std::hint::black_box;

fn engine_with_relationships(count: u64) -> ProgressionEngine<RecordedMetrics> {
    let mut engine = ProgressionEngine::new(
        StoreBackend::InMemory(MemoryStore::new()),
        RecordedMetrics::new(),
    );
    for i in 0..count {
        engine
            .create_relationship(RelationshipId(i), PartyId(i * 2), PartyId(i * 2 + 1), 0)
            .unwrap();
        engine.metrics_mut().report(
            RelationshipId(i),
            ActivitySnapshot {
                active_days: 5,
                activities_completed: 2,
                calls_completed: 1,
            },
        );
    }
    engine
}

fn bench_status(c: &mut Criterion) {
    let mut engine = engine_with_relationships(100);
    c.bench_function("status_read_with_evaluation", |b| {
        b.iter(|| {
            let report = engine.status(black_box(RelationshipId(50)), 1_000).unwrap();
            black_box(report.progress.percent)
        });
    });
}

fn bench_sign_off_cycle(c: &mut Criterion) {
    c.bench_function("dual_sign_off_with_advancement", |b| {
        b.iter(|| {
            let mut engine = engine_with_relationships(1);
            engine.metrics_mut().report(
                RelationshipId(0),
                ActivitySnapshot {
                    active_days: 7,
                    ..Default::default()
                },
            );
            engine
                .sign_off(RelationshipId(0), RequirementId(2), PartyId(0), 10)
                .unwrap();
            let outcome = engine
                .sign_off(RelationshipId(0), RequirementId(2), PartyId(1), 20)
                .unwrap();
            black_box(outcome.stage)
        });
    });
}

criterion_group!(benches, bench_status, bench_sign_off_cycle);
criterion_main!(benches);
