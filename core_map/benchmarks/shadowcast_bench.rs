use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use core_map::{
    calendar, CreatureTracker, LightConfig, LightMap, MapGrid, MapData, Observer, TilePos,
};
use core_map::mapdata::terrain;

/// One opaque tile in ten, matching the ratio the engine sees in built-up
/// areas.
fn random_grid(size: u32, seed: u64) -> MapGrid {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut grid = MapGrid::new(size, size, Arc::new(MapData::builtin()));
    grid.fill_terrain(terrain::T_FLOOR);
    for y in 0..size as i32 {
        for x in 0..size as i32 {
            if rng.gen_range(0..10) == 0 {
                grid.set_terrain(TilePos::new(x, y, 0), terrain::T_BRICK_WALL)
                    .unwrap();
            }
        }
    }
    grid
}

fn bench_light_cast(c: &mut Criterion) {
    let mut group = c.benchmark_group("light_cast");
    let cfg = LightConfig::default();

    for size in [31u32, 61, 121] {
        group.bench_with_input(BenchmarkId::new("apply_source", size), &size, |b, &size| {
            let grid = random_grid(size, 0x5EED);
            let observer = Observer::new(TilePos::new(size as i32 / 2, size as i32 / 2, 0));
            let mut lightmap = LightMap::new();
            lightmap.generate(&grid, &CreatureTracker::default(), &observer, 0, &cfg);

            let center = TilePos::new(size as i32 / 2, size as i32 / 2, 0);
            b.iter(|| {
                lightmap.apply_light_source(center, 50.0, &cfg);
            });
        });
    }

    group.finish();
}

fn bench_full_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("lightmap_generate");
    let cfg = LightConfig::default();

    for size in [31u32, 61, 121] {
        group.bench_with_input(BenchmarkId::new("grid", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let mut grid = random_grid(size, 0xCA57);
                    grid.add_field(
                        TilePos::new(3, 3, 0),
                        core_map::fields::FD_FIRE,
                        3,
                    )
                    .unwrap();
                    let observer = Observer::new(TilePos::new(size as i32 / 2, size as i32 / 2, 0));
                    (grid, observer, LightMap::new())
                },
                |(grid, observer, mut lightmap)| {
                    lightmap.generate(
                        &grid,
                        &CreatureTracker::default(),
                        &observer,
                        calendar::turn_at(0, 12),
                        &cfg,
                    );
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(cast_benches, bench_light_cast, bench_full_generate);
criterion_main!(cast_benches);
