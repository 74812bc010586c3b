//! Benchmarks for gesture planning and action encoding.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gameflow::core::ScreenSize;
use gameflow::gesture::{drag_sequence, plan_adaptive, plan_offset, tap_sequence};
use std::time::Duration;

fn planning_benchmark(c: &mut Criterion) {
    let size = ScreenSize::new(2400, 1080);

    c.bench_function("plan_adaptive", |b| {
        b.iter(|| plan_adaptive(black_box(size)))
    });

    c.bench_function("plan_offset", |b| {
        b.iter(|| plan_offset(black_box(size), black_box(50)))
    });
}

fn encoding_benchmark(c: &mut Criterion) {
    let (from, to) = plan_adaptive(ScreenSize::new(1080, 2400));
    let drag = drag_sequence(from, to, Duration::from_millis(1000));
    let tap = tap_sequence(from, Duration::from_millis(100));

    c.bench_function("drag_to_w3c", |b| b.iter(|| black_box(&drag).to_w3c()));
    c.bench_function("tap_to_w3c", |b| b.iter(|| black_box(&tap).to_w3c()));
}

criterion_group!(benches, planning_benchmark, encoding_benchmark);
criterion_main!(benches);
