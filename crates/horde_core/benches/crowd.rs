//! Crowd benchmarks for horde_core.
//!
//! Run with: `cargo bench -p horde_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use horde_core::prelude::*;

fn crowd(agents: usize) -> (CrowdSim, NavigationField) {
    let config = CrowdConfig {
        capacity: agents,
        seed: 42,
        ..CrowdConfig::default()
    };
    let mut sim = CrowdSim::new(config).expect("default config is valid");
    sim.spawn(agents, Vec2::ZERO);

    let mut nav = NavigationField::new(sim.config().bounds, 32.0).expect("bounds are valid");
    nav.add_obstacle_rect(Vec2::new(-200.0, -40.0), Vec2::new(400.0, 80.0));
    nav.add_obstacle_circle(Vec2::new(300.0, 300.0), 60.0);
    nav.build_flow_field(Vec2::ZERO);
    (sim, nav)
}

/// Cost of one `update` at several crowd sizes.
pub fn tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("crowd_tick");
    for agents in [1_000usize, 5_000, 20_000] {
        let (mut sim, nav) = crowd(agents);
        group.bench_with_input(BenchmarkId::from_parameter(agents), &agents, |b, _| {
            b.iter(|| black_box(sim.update(16.0, Vec2::ZERO, &nav)));
        });
    }
    group.finish();
}

/// Cost of a full BFS rebuild on the default world.
pub fn flow_field_benchmark(c: &mut Criterion) {
    let (_, mut nav) = crowd(1);
    let mut flip = false;
    c.bench_function("flow_field_rebuild", |b| {
        b.iter(|| {
            flip = !flip;
            let target = if flip { Vec2::new(500.0, 500.0) } else { Vec2::new(-500.0, -500.0) };
            nav.build_flow_field(black_box(target));
        });
    });
}

/// Cost of rebuilding the separation grid over every agent.
pub fn density_benchmark(c: &mut Criterion) {
    let (sim, _) = crowd(20_000);
    c.bench_function("density_snapshot_20k", |b| {
        b.iter(|| black_box(sim.density_snapshot().len()));
    });
}

criterion_group!(benches, tick_benchmark, flow_field_benchmark, density_benchmark);
criterion_main!(benches);
