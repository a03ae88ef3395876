//! Benchmarks for dashboard aggregation.
//!
//! Benchmark targets (SQLite, 10,000 events over 30 days):
//! - summary: <10ms
//! - today / week / month: <50ms
//! - recent logs (default limit): <5ms
//!
//! The in-memory store isolates bucketing cost from storage cost.

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use posturelog::classifier::label_for;
use posturelog::clock::ManualClock;
use posturelog::models::PostureEvent;
use posturelog::services::{AggregationService, RecentLogsQuery};
use posturelog::storage::{InMemoryPostureStore, PostureLogStore, SqlitePostureStore};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 20, 17, 0, 0).unwrap()
}

/// Spreads `count` events evenly over the 30 days before `now`.
fn events(count: usize) -> Vec<PostureEvent> {
    let span = 30 * 24 * 3600;
    let step = span / i64::try_from(count.max(1)).unwrap();
    (0..count)
        .map(|i| {
            let i = i64::try_from(i).unwrap();
            let angle = 70.0 + (i % 50) as f64;
            PostureEvent::new(
                now() - ChronoDuration::seconds(span - i * step),
                label_for(angle),
                angle,
                30 + (i % 240) as u64,
            )
        })
        .collect()
}

fn populate(store: &dyn PostureLogStore, count: usize) {
    for event in events(count) {
        store.append(&event).expect("Failed to append event");
    }
}

fn service(store: Arc<dyn PostureLogStore>) -> AggregationService {
    AggregationService::new(store, Arc::new(ManualClock::new(now())))
}

fn sqlite_service(temp_dir: &TempDir, count: usize) -> AggregationService {
    let store = SqlitePostureStore::new(temp_dir.path().join("bench_posture_logs.db"))
        .expect("Failed to create SQLite store");
    populate(&store, count);
    service(Arc::new(store))
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_sqlite_queries(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let svc = sqlite_service(&temp_dir, 10_000);

    let mut group = c.benchmark_group("sqlite_10000_events");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("summary", |b| b.iter(|| black_box(svc.summary().unwrap())));
    group.bench_function("today", |b| b.iter(|| black_box(svc.today().unwrap())));
    group.bench_function("week", |b| b.iter(|| black_box(svc.week().unwrap())));
    group.bench_function("month", |b| b.iter(|| black_box(svc.month().unwrap())));
    group.bench_function("recent_logs", |b| {
        b.iter(|| black_box(svc.recent_logs(RecentLogsQuery::default()).unwrap()));
    });

    group.finish();
}

fn bench_month_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("month_scaling");

    for count in [100, 1_000, 10_000] {
        let store = InMemoryPostureStore::new();
        populate(&store, count);
        let svc = service(Arc::new(store));

        group.bench_with_input(BenchmarkId::new("in_memory", count), &svc, |b, svc| {
            b.iter(|| black_box(svc.month().unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sqlite_queries, bench_month_scaling);
criterion_main!(benches);
