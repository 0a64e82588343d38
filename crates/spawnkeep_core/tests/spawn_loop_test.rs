//! # Spawn Loop Integration Test
//!
//! Drives spawn loops through the tick scheduler against the simulated host.

use std::sync::Arc;

use spawnkeep_core::{
    HostWorld, Registry, RegistryError, ServiceSettings, SimWorld, SpawnStrategy, SpawnerService,
    StrategyRegistry, TaskScheduler, TickScheduler, TypeConfigStore,
};
use spawnkeep_shared::{
    BlockPos, EntityId, Location, SpawnReason, SpawnerLocation, SpawnerTypeConfig,
};

struct Harness {
    service: SpawnerService,
    scheduler: Arc<TickScheduler>,
    host: Arc<SimWorld>,
}

fn harness(config: SpawnerTypeConfig) -> Harness {
    harness_with(config, Arc::new(SimWorld::with_world("world")), StrategyRegistry::new())
}

fn harness_with(config: SpawnerTypeConfig, host: Arc<SimWorld>, strategies: StrategyRegistry) -> Harness {
    let types = Arc::new(TypeConfigStore::new());
    types.register("wisp", config).unwrap();
    let scheduler = Arc::new(TickScheduler::new());
    let service = SpawnerService::new(
        types,
        Arc::new(Registry::new()),
        Arc::new(strategies),
        host.clone(),
        scheduler.clone(),
        ServiceSettings {
            seed: Some(42),
            ..ServiceSettings::default()
        },
    );
    Harness {
        service,
        scheduler,
        host,
    }
}

fn open_config(warmup: u32, cooldown: u32) -> SpawnerTypeConfig {
    SpawnerTypeConfig {
        warmup,
        cooldown,
        max_mobs: 1000,
        check_for_players: false,
        ..SpawnerTypeConfig::wisp()
    }
}

fn origin() -> Location {
    Location::new("world", 0.0, 64.0, 0.0)
}

/// Test: 400/40 gives one attempt, ten skipped invocations, then the next.
#[test]
fn test_warmup_cooldown_timing() {
    let h = harness(open_config(400, 40));
    h.service.register_spawner("wisp", &origin(), Some(false)).unwrap();

    // First invocation attempts immediately.
    h.scheduler.advance(1);
    assert_eq!(h.host.creation_requests(), 1);

    // Ten invocations warming up.
    h.scheduler.advance(40 * 10);
    assert_eq!(h.host.creation_requests(), 1);

    // Eleventh after the reset fires.
    h.scheduler.advance(40);
    assert_eq!(h.host.creation_requests(), 2);
}

/// Test: with no warmup every invocation attempts.
#[test]
fn test_zero_warmup_attempts_every_invocation() {
    let h = harness(open_config(0, 20));
    h.service.register_spawner("wisp", &origin(), Some(false)).unwrap();

    h.scheduler.advance(1 + 20 * 4);
    assert_eq!(h.host.creation_requests(), 5);
}

/// Creates through the host, then refuses every entity and removes it.
struct RejectingSetup {
    world: Arc<SimWorld>,
}

impl SpawnStrategy for RejectingSetup {
    fn create(&self, host: &dyn HostWorld, type_name: &str, at: &Location) -> Option<EntityId> {
        host.create_entity(type_name, at)
    }

    fn setup(&self, _: &dyn HostWorld, id: EntityId) -> bool {
        self.world.despawn(id);
        false
    }
}

/// Test: an entity refused by setup is not counted and the loop keeps trying.
#[test]
fn test_failed_setup_not_tracked() {
    let host = Arc::new(SimWorld::with_world("world"));
    let strategies = StrategyRegistry::new();
    strategies
        .register("wisp", Arc::new(RejectingSetup { world: host.clone() }))
        .unwrap();
    let h = harness_with(open_config(0, 1), host, strategies);
    h.service.register_spawner("wisp", &origin(), Some(true)).unwrap();
    let loc = SpawnerLocation::normalize(&origin());

    h.scheduler.advance(10);
    assert_eq!(h.host.creation_requests(), 10);
    assert_eq!(h.host.entity_count(), 0);
    assert_eq!(h.service.registry().count(&loc), 0);
    assert_eq!(h.service.registry().entity_count(), 0);
    assert!(h.service.registry().leashed(&loc).is_empty());
}

/// Test: population never exceeds the cap.
#[test]
fn test_population_cap() {
    let config = SpawnerTypeConfig {
        max_mobs: 3,
        mobs_per_attempt: 5,
        ..open_config(0, 1)
    };
    let h = harness(config);
    h.service.register_spawner("wisp", &origin(), Some(false)).unwrap();
    let loc = SpawnerLocation::normalize(&origin());

    for _ in 0..50 {
        h.scheduler.tick();
        assert!(h.service.registry().count(&loc) <= 3);
    }
    assert_eq!(h.service.registry().count(&loc), 3);
    assert_eq!(h.host.creation_requests(), 3);

    // A death frees one slot.
    let victim = h.service.registry().spawned_by(&loc)[0];
    assert!(h.host.despawn(victim));
    assert!(h.service.entity_removed(victim));
    assert_eq!(h.service.registry().count(&loc), 2);

    h.scheduler.tick();
    assert_eq!(h.service.registry().count(&loc), 3);
}

/// Test: a wisp without a nearby player never spawns, one at 10 blocks does.
#[test]
fn test_wisp_player_gate() {
    let h = harness(SpawnerTypeConfig::wisp());
    h.service.register_spawner("wisp", &origin(), None).unwrap();
    let player = h.host.add_player(Location::new("world", 100.0, 64.0, 0.0));

    h.scheduler.advance(1 + 40 * 30);
    assert_eq!(h.host.creation_requests(), 0);

    h.host.move_player(player, Location::new("world", 10.0, 64.0, 0.0));
    let mut ticks = 0;
    while h.host.creation_requests() == 0 && ticks < 40 * 12 {
        h.scheduler.tick();
        ticks += 1;
    }
    let requests = h.host.creation_requests();
    assert!(requests >= 1);
    assert!(requests <= u64::from(SpawnerTypeConfig::wisp().mobs_per_attempt));
}

/// Test: a player in another world does not open the gate.
#[test]
fn test_player_in_other_world_ignored() {
    let h = harness(SpawnerTypeConfig {
        warmup: 0,
        ..SpawnerTypeConfig::wisp()
    });
    h.host.add_player(Location::new("nether", 0.0, 64.0, 0.0));
    h.service.register_spawner("wisp", &origin(), None).unwrap();

    h.scheduler.advance(200);
    assert_eq!(h.host.creation_requests(), 0);
}

/// Test: deleting cancels loops, a second delete is a no-op.
#[test]
fn test_delete_cancels_loops() {
    let h = harness(open_config(0, 5));
    h.service.register_spawner("wisp", &origin(), Some(true)).unwrap();
    let loc = SpawnerLocation::normalize(&origin());
    h.scheduler.advance(3);

    let spawn = h.service.registry().spawn_task(&loc).unwrap();
    let leash = h.service.registry().leash_task(&loc).unwrap();
    assert!(h.scheduler.is_scheduled(spawn));
    assert!(h.scheduler.is_scheduled(leash));

    assert!(h.service.delete_spawner(&loc));
    assert!(!h.scheduler.is_scheduled(spawn));
    assert!(!h.scheduler.is_scheduled(leash));
    assert_eq!(h.service.registry().count(&loc), 0);
    assert!(h.service.registry().leashed(&loc).is_empty());
    assert!(h.service.list_spawners().is_empty());

    let requests = h.host.creation_requests();
    h.scheduler.advance(50);
    assert_eq!(h.host.creation_requests(), requests);

    assert!(!h.service.delete_spawner(&loc));
}

/// Test: two registrations at one block leave one spawner and one loop.
#[test]
fn test_register_twice_overwrites() {
    let h = harness(open_config(400, 40));
    let first = h.service.register_spawner("wisp", &origin(), Some(false)).unwrap();
    let second = h
        .service
        .register_spawner("wisp", &Location::new("world", 0.7, 64.2, 0.9), Some(false))
        .unwrap();

    let spawners = h.service.list_spawners();
    assert_eq!(spawners.len(), 1);
    assert_eq!(spawners[0].id, second);
    assert_ne!(first, second);
    assert_eq!(h.scheduler.len(), 1);
    assert!(h.service.registry().location_of(first).is_none());
}

/// Test: unknown types are rejected, not defaulted.
#[test]
fn test_unknown_type_rejected() {
    let h = harness(SpawnerTypeConfig::wisp());
    let err = h.service.register_spawner("ghost", &origin(), None).unwrap_err();
    assert_eq!(err, RegistryError::ConfigurationMissing("ghost".to_string()));
    assert!(h.service.list_spawners().is_empty());
    assert!(h.scheduler.is_empty());
}

/// Test: unloading the world stops the loop.
#[test]
fn test_unloaded_world_stops_loop() {
    let h = harness(open_config(0, 1));
    h.service.register_spawner("wisp", &origin(), Some(false)).unwrap();
    h.scheduler.advance(2);

    h.host.unload_world("world");
    h.scheduler.advance(2);
    assert!(h.scheduler.is_empty());
    assert_eq!(h.service.list_spawners().len(), 1);
}

/// Test: obstructed footprints exhaust attempts silently.
#[test]
fn test_obstructed_footprint() {
    let config = SpawnerTypeConfig {
        radius_x: 0.0,
        radius_y: 0.0,
        ..open_config(0, 1)
    };
    let h = harness(config);
    h.host.obstruct("world", BlockPos::new(0, 65, 0));
    h.service.register_spawner("wisp", &origin(), Some(false)).unwrap();

    h.scheduler.advance(10);
    assert_eq!(h.host.creation_requests(), 0);
    assert_eq!(h.service.registry().entity_count(), 0);
}

/// Test: summon with SPAWNER has no origin and is recorded as UNKNOWN.
#[test]
fn test_summon() {
    let h = harness(SpawnerTypeConfig::wisp());
    let id = h.service.summon("wisp", &origin(), SpawnReason::Spawner).unwrap();
    let record = h.service.registry().entity(id).unwrap();
    assert_eq!(record.reason(), SpawnReason::Unknown);
    assert!(record.origin().is_none());

    let id = h.service.summon("wisp", &origin(), SpawnReason::Command).unwrap();
    assert_eq!(h.service.registry().entity(id).unwrap().reason(), SpawnReason::Command);

    h.host.set_refuse_creation(true);
    assert!(matches!(
        h.service.summon("wisp", &origin(), SpawnReason::Natural),
        Err(RegistryError::HostRejected(_))
    ));
    assert!(matches!(
        h.service.summon("ghost", &origin(), SpawnReason::Natural),
        Err(RegistryError::ConfigurationMissing(_))
    ));
}
