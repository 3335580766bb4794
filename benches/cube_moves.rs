//! Benchmarks for CPU-side experiment work: cube moves, life generations and
//! galaxy generation.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use vislab::experiments::galaxy::{generate_galaxy, GalaxyParams};
use vislab::experiments::life::LifeGrid;
use vislab::experiments::rubiks::{Axis, CubeConfig, CubeEngine, CubeId, Direction};

fn bench_quarter_turn(c: &mut Criterion) {
    let mut group = c.benchmark_group("quarter_turn");

    for size in [3usize, 4, 5] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let config = CubeConfig {
                size,
                ..CubeConfig::default()
            };
            let mut engine = CubeEngine::new(config);
            b.iter(|| {
                let _task = engine.rotate(CubeId(0), Axis::Y, Direction::Positive);
                while engine.tick(1.0 / 60.0).is_none() {}
                black_box(engine.lattice_error())
            })
        });
    }

    group.finish();
}

fn bench_select_slice(c: &mut Criterion) {
    let engine = CubeEngine::new(CubeConfig::default());
    c.bench_function("select_slice", |b| {
        b.iter(|| black_box(engine.select_slice(black_box(CubeId(21)), Axis::Z)))
    });
}

fn bench_life_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("life_step");

    for size in [50usize, 100, 200] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut grid = LifeGrid::new(size, size);
            grid.randomize(&mut StdRng::seed_from_u64(3), 0.3);
            b.iter(|| black_box(grid.step().len()))
        });
    }

    group.finish();
}

fn bench_generate_galaxy(c: &mut Criterion) {
    let params = GalaxyParams::default();
    c.bench_function("generate_galaxy", |b| {
        let mut rng = StdRng::seed_from_u64(11);
        b.iter(|| black_box(generate_galaxy(&params, &mut rng)))
    });
}

criterion_group!(
    benches,
    bench_quarter_turn,
    bench_select_slice,
    bench_life_step,
    bench_generate_galaxy,
);
criterion_main!(benches);
