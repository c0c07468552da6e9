//! Benchmarks for query-variable recomputation and change tracking.
//!
//! Run with: cargo bench -p natural-runtime --bench variables_bench

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use natural_core::{Map, Value};
use natural_runtime::{CumulativeChanges, QueryVariablesManager};
use std::hint::black_box;

/// A fragment shaped like a list filter: `width` conditions, each a small object.
fn filter_fragment(seed: usize, width: usize) -> Map {
    let mut conditions = Map::new();
    for i in 0..width {
        let mut condition = Map::new();
        condition.insert("equal".into(), Value::from((seed * 31 + i) as i64));
        conditions.insert(format!("field{i}"), condition.into());
    }
    let mut filter = Map::new();
    filter.insert("conditions".into(), conditions.into());
    let mut fragment = Map::new();
    fragment.insert("filter".into(), filter.into());
    fragment
}

fn record(fields: usize, changed: usize) -> Map {
    (0..fields)
        .map(|i| {
            let value = if i < changed { i as i64 + 1000 } else { i as i64 };
            (format!("field{i}"), Value::from(value))
        })
        .collect()
}

fn bench_channel_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("variables/set");

    for channels in [2usize, 5, 10] {
        let qvm = QueryVariablesManager::new();
        for ch in 0..channels {
            qvm.set(&format!("channel{ch}"), Some(filter_fragment(ch, 8)));
        }
        let fragments = [filter_fragment(100, 8), filter_fragment(200, 8)];
        group.bench_with_input(
            BenchmarkId::new("recompute", format!("{channels}ch")),
            &(),
            |b, _| {
                let mut flip = 0;
                b.iter(|| {
                    flip ^= 1;
                    qvm.set("channel0", Some(fragments[flip].clone()));
                    black_box(qvm.version())
                });
            },
        );
    }

    group.finish();
}

fn bench_differences(c: &mut Criterion) {
    let mut group = c.benchmark_group("changes/differences");

    for (fields, changed) in [(20, 0), (20, 5), (200, 20)] {
        let baseline = record(fields, 0);
        let candidate = record(fields, changed);
        group.bench_with_input(
            BenchmarkId::new("snapshot", format!("{fields}f_{changed}c")),
            &(),
            |b, _| {
                b.iter(|| {
                    let mut changes = CumulativeChanges::new();
                    changes.initialize(&baseline);
                    black_box(changes.differences(&candidate))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_channel_set, bench_differences);
criterion_main!(benches);
