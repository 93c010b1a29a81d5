//! Performance benchmarks for the Oak parser.
//!
//! Each script in `test_scripts/` is parsed on its own, then a generated
//! module grows the definition count to measure scaling.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oak_core::{PackageIdentifier, SourceFile};
use oak_parser::parse_module;
use std::hint::black_box;

const SCRIPTS: [(&str, &str); 4] = [
    ("hello", include_str!("../test_scripts/Hello.oak")),
    ("shapes", include_str!("../test_scripts/Shapes.oak")),
    ("lists", include_str!("../test_scripts/Lists.oak")),
    ("records", include_str!("../test_scripts/Records.oak")),
];

fn parse(path: &str, source: &str) -> usize {
    let file = SourceFile::new(path, source);
    match parse_module(&file, PackageIdentifier::new("bench")) {
        Ok(module) => module.definitions.len(),
        Err(_) => 0,
    }
}

/// Benchmark parsing each test script
fn script_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/scripts");
    for (name, source) in SCRIPTS {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_function(name, |b| b.iter(|| black_box(parse(name, black_box(source)))));
    }
    group.finish();
}

/// A module with `count` small functions.
fn generated_module(count: usize) -> String {
    let mut source = String::from("module Generated\n\n");
    for i in 0..count {
        source.push_str(&format!(
            "def f{i}(x, y) =\n    select x\n        case 0 -> y * {i}\n        case n -> f{i}(n - 1, y + 1)\n    end\n\n"
        ));
    }
    source
}

/// Benchmark parsing as the number of definitions grows
fn scaling_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/scaling");
    for count in [10, 100, 1000] {
        let source = generated_module(count);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &source, |b, source| {
            b.iter(|| black_box(parse("Generated.oak", black_box(source))))
        });
    }
    group.finish();
}

criterion_group!(benches, script_benchmarks, scaling_benchmarks);
criterion_main!(benches);
