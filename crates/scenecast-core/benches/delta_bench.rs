use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use scenecast_core::{Cursor, Line, Snapshot, apply_diff, compute_diff};

fn snapshot_with_lines(count: usize, offset: u64) -> Snapshot {
    Snapshot {
        lines: (0..count)
            .map(|i| Line::plain(format!("line {i} with some representative width")))
            .collect(),
        cursor: Cursor {
            x: 0,
            y: 0,
            visible: true,
        },
        cols: 80,
        rows: 24,
        alternate: false,
        lines_offset: Some(offset),
        timestamp: 0,
    }
}

fn scrolled_successor(prev: &Snapshot, scroll: u64) -> Snapshot {
    let mut next = prev.clone();
    next.lines_offset = Some(prev.lines_offset.unwrap_or(0) + scroll);
    next.lines.drain(0..scroll as usize);
    for i in 0..scroll as usize {
        next.lines.push(Line::plain(format!("fresh line {i}")));
    }
    next
}

fn bench_compute_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_diff");
    for &len in &[24usize, 256, 1024] {
        let prev = snapshot_with_lines(len, 0);
        let curr = scrolled_successor(&prev, 8);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| black_box(compute_diff(black_box(&prev), black_box(&curr))));
        });
    }
    group.finish();
}

fn bench_apply_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_diff");
    for &len in &[24usize, 256, 1024] {
        let prev = snapshot_with_lines(len, 0);
        let curr = scrolled_successor(&prev, 8);
        let delta = compute_diff(&prev, &curr).expect("encodable");
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| black_box(apply_diff(black_box(&prev), black_box(&delta), 1)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compute_diff, bench_apply_diff);
criterion_main!(benches);
