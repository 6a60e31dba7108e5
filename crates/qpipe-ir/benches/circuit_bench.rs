//! Benchmarks for circuit construction and queries.
//!
//! Run with: cargo bench -p qpipe-ir

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use qpipe_ir::{Circuit, CircuitBuilder, QubitId};

fn layered(n: u32, layers: usize) -> Circuit {
    let mut b = CircuitBuilder::new("bench", n, 0);
    for _ in 0..layers {
        for i in 0..n {
            b.h(QubitId(i)).unwrap();
        }
        for i in (0..n - 1).step_by(2) {
            b.cx(QubitId(i), QubitId(i + 1)).unwrap();
        }
    }
    b.build()
}

fn bench_ghz_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("ghz_build");
    for n in &[3u32, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::new("ghz", n), n, |b, &n| {
            b.iter(|| black_box(Circuit::ghz(n).unwrap()));
        });
    }
    group.finish();
}

fn bench_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("circuit_depth");
    for n in &[5u32, 20, 50] {
        let circuit = layered(*n, 10);
        group.bench_with_input(BenchmarkId::new("linear_scan", n), &circuit, |b, c| {
            b.iter(|| black_box(c.depth()));
        });
        group.bench_with_input(BenchmarkId::new("dag", n), &circuit, |b, c| {
            b.iter(|| black_box(c.to_dag().depth()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ghz_build, bench_depth);
criterion_main!(benches);
