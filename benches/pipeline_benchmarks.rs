//! Performance benchmarks for the whole compilation pipeline.
//!
//! Run with the `profiling` feature to get per-stage scopes from the
//! compiler crates.

use criterion::{Criterion, criterion_group, criterion_main};
use oak_compiler::{CompileOptions, Compiler, PackageSource};
use std::hint::black_box;

fn scripts() -> PackageSource {
    PackageSource::new("scripts")
        .with_module("Hello", "test_scripts/Hello.oak", include_str!("../test_scripts/Hello.oak"))
        .with_module("Shapes", "test_scripts/Shapes.oak", include_str!("../test_scripts/Shapes.oak"))
        .with_module("Lists", "test_scripts/Lists.oak", include_str!("../test_scripts/Lists.oak"))
        .with_module(
            "Records",
            "test_scripts/Records.oak",
            include_str!("../test_scripts/Records.oak"),
        )
}

/// Benchmark a full compilation, with and without the parse cache
fn pipeline_benchmarks(c: &mut Criterion) {
    let packages = [scripts()];
    let mut group = c.benchmark_group("pipeline");

    group.bench_function("prelude_only", |b| {
        b.iter(|| {
            let compilation = Compiler::default().compile(&[]);
            black_box(compilation.map(|c| c.is_success()).unwrap_or(false))
        })
    });

    group.bench_function("scripts_cold", |b| {
        b.iter(|| {
            let mut compiler = Compiler::new(CompileOptions { debug: false });
            black_box(compiler.compile(black_box(&packages)).is_ok())
        })
    });

    let mut warm = Compiler::default();
    group.bench_function("scripts_cached_parse", |b| {
        b.iter(|| black_box(warm.compile(black_box(&packages)).is_ok()))
    });

    group.finish();
}

/// Benchmark writing and reading the linked binary
fn binary_benchmarks(c: &mut Criterion) {
    let Ok(compilation) = Compiler::default().compile(&[scripts()]) else {
        return;
    };
    let Some(binary) = compilation.binary else {
        return;
    };
    let Ok(bytes) = binary.write() else {
        return;
    };

    let mut group = c.benchmark_group("binary");
    group.bench_function("write", |b| b.iter(|| black_box(binary.write().map(|b| b.len()))));
    group.bench_function("read", |b| {
        b.iter(|| black_box(oak_compiler::Binary::read(black_box(&bytes)).is_ok()))
    });
    group.finish();
}

criterion_group!(benches, pipeline_benchmarks, binary_benchmarks);
criterion_main!(benches);
