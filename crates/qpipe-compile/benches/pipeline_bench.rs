//! Benchmarks for the compilation pipeline.
//!
//! Run with: cargo bench -p qpipe-compile

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use qpipe_compile::{BasisGates, CouplingMap, Device, Pipeline, PipelineConfig};
use qpipe_ir::{Circuit, CircuitBuilder, QubitId};

/// Brick-wall circuit with long-range interactions to force routing.
fn scrambler(n: u32, layers: u32) -> Circuit {
    let mut b = CircuitBuilder::new("scrambler", n, n);
    for layer in 0..layers {
        for q in 0..n {
            b.h(QubitId(q)).unwrap();
            b.rz(0.1 * f64::from(layer + q), QubitId(q)).unwrap();
        }
        for q in 0..n / 2 {
            let partner = (q + layer + n / 2) % n;
            if partner != q {
                b.cx(QubitId(q), QubitId(partner)).unwrap();
            }
        }
    }
    b.measure_all().unwrap();
    b.build()
}

fn bench_levels(c: &mut Criterion) {
    let device = Arc::new(Device::new("grid", BasisGates::ibm(), CouplingMap::grid(4, 4)));
    let circuit = scrambler(12, 8);
    let mut group = c.benchmark_group("compile_level");
    for level in 0..=1u8 {
        let config = PipelineConfig::default().with_optimization_level(level).unwrap();
        let pipeline = Pipeline::new(device.clone(), config).unwrap();
        group.bench_with_input(BenchmarkId::new("grid16", level), &circuit, |b, c| {
            b.iter(|| black_box(pipeline.compile(c).unwrap()));
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let device = Arc::new(Device::new("heavy", BasisGates::heron(), CouplingMap::ring(20)));
    let pipeline = Pipeline::new(device, PipelineConfig::default()).unwrap();
    let circuits: Vec<Circuit> = (0..32).map(|i| scrambler(8 + i % 8, 4)).collect();
    c.bench_function("compile_batch_32", |b| {
        b.iter(|| black_box(pipeline.compile_batch(&circuits)));
    });
}

criterion_group!(benches, bench_levels, bench_batch);
criterion_main!(benches);
