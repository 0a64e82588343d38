//! Benchmark for spawn and leash loop throughput.
//!
//! Run with: cargo bench --package spawnkeep_core --bench spawn_tick_benchmark

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use spawnkeep_core::{
    Registry, ServiceSettings, SimWorld, SpawnerService, StrategyRegistry, TickScheduler,
    TypeConfigStore,
};
use spawnkeep_shared::{Location, SpawnerTypeConfig};

fn create_world(spawners: i32) -> (SpawnerService, Arc<TickScheduler>) {
    let types = Arc::new(TypeConfigStore::new());
    types
        .register(
            "wisp",
            SpawnerTypeConfig {
                warmup: 0,
                cooldown: 1,
                max_mobs: 8,
                has_leash_default: true,
                ..SpawnerTypeConfig::wisp()
            },
        )
        .unwrap();

    let scheduler = Arc::new(TickScheduler::new());
    let host = Arc::new(SimWorld::with_world("world"));
    host.add_player(Location::new("world", 0.0, 64.0, 0.0));

    let service = SpawnerService::new(
        types,
        Arc::new(Registry::new()),
        Arc::new(StrategyRegistry::new()),
        host,
        scheduler.clone(),
        ServiceSettings {
            seed: Some(7),
            ..ServiceSettings::default()
        },
    );

    // Grid of spawners, all within activation range of the player
    for i in 0..spawners {
        let x = f64::from(i % 8) * 4.0;
        let z = f64::from(i / 8) * 4.0;
        service
            .register_spawner("wisp", &Location::new("world", x, 64.0, z), None)
            .unwrap();
    }

    (service, scheduler)
}

fn benchmark_tick_64_spawners(c: &mut Criterion) {
    let (service, scheduler) = create_world(64);

    // Fill every spawner to its cap first
    scheduler.advance(20);

    c.bench_function("tick_64_spawners_at_cap", |b| {
        b.iter(|| black_box(scheduler.tick()));
    });

    black_box(service.registry().entity_count());
}

fn benchmark_fill_from_empty(c: &mut Criterion) {
    c.bench_function("fill_16_spawners_from_empty", |b| {
        b.iter(|| {
            let (service, scheduler) = create_world(16);
            scheduler.advance(10);
            black_box(service.registry().entity_count())
        });
    });
}

criterion_group!(benches, benchmark_tick_64_spawners, benchmark_fill_from_empty);
criterion_main!(benches);
