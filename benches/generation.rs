//! Benchmarks for graph, dungeon, and whole-world generation.
//!
//! Run with: cargo bench --bench generation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use worldweave::{
    GenerationConfig, GenerationContext, Generator, GraphGenerator, GraphParams, JsonCatalog,
    Position, WorldGenerator,
};

fn benchmark_graph(c: &mut Criterion) {
    let generator = GraphGenerator::new(GraphParams {
        width: 7,
        height: 7,
        goals: vec![Position::new(0, 3), Position::new(6, 3)],
        num_security_levels: 3,
        tiles_per_security_level: 6,
        branch_limit_per_level: 3,
        directness: 2,
        branch_chance_percent: 40,
    });

    c.bench_function("gated_graph_7x7", |b| {
        let mut seed = 0u64;
        b.iter(|| {
            seed = seed.wrapping_add(1);
            let mut ctx = GenerationContext::default();
            black_box(generator.generate(&mut ctx, seed).ok())
        });
    });
}

fn benchmark_world(c: &mut Criterion) {
    let catalog = JsonCatalog::builtin().unwrap();
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

    let mut group = c.benchmark_group("world_generation");
    group.sample_size(10);

    let small = WorldGenerator::new(&catalog, GenerationConfig::for_testing(1)).unwrap();
    group.bench_function("testing_config", |b| {
        b.iter(|| black_box(runtime.block_on(small.generate_world()).ok()))
    });

    let full = WorldGenerator::new(&catalog, GenerationConfig::new(1)).unwrap();
    group.bench_function("default_config", |b| {
        b.iter(|| black_box(runtime.block_on(full.generate_world()).ok()))
    });

    group.finish();
}

criterion_group!(benches, benchmark_graph, benchmark_world);
criterion_main!(benches);
