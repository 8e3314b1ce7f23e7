//! Synthesis performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pptree_core::{
    check, synthesize, SynthConfig, Topology, TopologyBuilder, TransformDescriptor,
    TransformEngine,
};

fn benchmark_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for topology in Topology::ALL {
        group.bench_with_input(
            BenchmarkId::new(topology.name(), 64),
            &topology,
            |b, &topology| {
                let builder = TopologyBuilder::new(64).unwrap();
                b.iter(|| black_box(builder.build(topology).unwrap().node_count()));
            },
        );
    }
    group.finish();
}

fn benchmark_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    for width in [16, 64, 256] {
        let graph = TopologyBuilder::new(width)
            .unwrap()
            .build(Topology::KoggeStone)
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(width), &graph, |b, graph| {
            b.iter(|| black_box(check(graph).is_ok()));
        });
    }
    group.finish();
}

fn benchmark_flatten_chain(c: &mut Criterion) {
    // Flatten the top row of a 32-bit ripple-carry adder repeatedly
    let sequence: Vec<TransformDescriptor> = (0..8)
        .map(|_| TransformDescriptor::parse_token("LF@31", 0).unwrap())
        .collect();
    let graph = TopologyBuilder::new(32)
        .unwrap()
        .build(Topology::RippleCarry)
        .unwrap();

    c.bench_function("flatten_chain", |b| {
        let engine = TransformEngine::new();
        b.iter(|| black_box(engine.run(graph.clone(), &sequence).is_completed()));
    });
}

fn benchmark_end_to_end(c: &mut Criterion) {
    let config = SynthConfig {
        width: 64,
        start: "sklansky".to_string(),
        ..Default::default()
    };

    c.bench_function("end_to_end", |b| {
        b.iter(|| {
            let synthesis = synthesize(&config).unwrap();
            let verilog = pptree_codegen::generate_verilog(&synthesis.netlist).unwrap();
            black_box(verilog.len())
        });
    });
}

criterion_group!(
    benches,
    benchmark_build,
    benchmark_validate,
    benchmark_flatten_chain,
    benchmark_end_to_end
);
criterion_main!(benches);
