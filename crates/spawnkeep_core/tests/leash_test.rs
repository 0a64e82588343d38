//! # Leash Integration Test
//!
//! Tethered entities are pulled back; vanished ones are pruned.

use std::sync::Arc;

use spawnkeep_core::{
    HostWorld, LeashSettings, Registry, ServiceSettings, SimWorld, SpawnerService,
    StrategyRegistry, TaskScheduler, TickScheduler, TypeConfigStore,
};
use spawnkeep_shared::{EntityId, Location, SpawnerLocation, SpawnerTypeConfig};

fn leashed_wisp() -> SpawnerTypeConfig {
    SpawnerTypeConfig {
        warmup: 0,
        cooldown: 1000,
        mobs_per_attempt: 1,
        check_for_players: false,
        has_leash_default: true,
        ..SpawnerTypeConfig::wisp()
    }
}

fn setup() -> (SpawnerService, Arc<TickScheduler>, Arc<SimWorld>, SpawnerLocation) {
    let types = Arc::new(TypeConfigStore::new());
    types.register("wisp", leashed_wisp()).unwrap();
    let scheduler = Arc::new(TickScheduler::new());
    let host = Arc::new(SimWorld::with_world("world"));
    let service = SpawnerService::new(
        types,
        Arc::new(Registry::new()),
        Arc::new(StrategyRegistry::new()),
        host.clone(),
        scheduler.clone(),
        ServiceSettings {
            leash: LeashSettings {
                max_distance: 16.0,
                period_ticks: 10,
            },
            seed: Some(1),
        },
    );

    let at = Location::new("world", 5.0, 70.0, 5.0);
    service.register_spawner("wisp", &at, None).unwrap();
    (service, scheduler, host, SpawnerLocation::normalize(&at))
}

fn only_entity(service: &SpawnerService, loc: &SpawnerLocation) -> EntityId {
    let members = service.registry().leashed(loc);
    assert_eq!(members.len(), 1);
    members[0]
}

/// Test: the type default turns the leash on and spawns join the set.
#[test]
fn test_spawned_entity_is_leashed() {
    let (service, scheduler, _host, loc) = setup();
    assert!(service.list_spawners()[0].has_leash);

    scheduler.advance(1);
    let id = only_entity(&service, &loc);
    assert_eq!(service.registry().spawned_by(&loc), vec![id]);
    assert!(service.registry().leash_task(&loc).is_some());
}

/// Test: an entity past the tether is moved back to the spawner.
#[test]
fn test_strayed_entity_relocated() {
    let (service, scheduler, host, loc) = setup();
    scheduler.advance(1);
    let id = only_entity(&service, &loc);

    // Within the tether: untouched.
    host.move_entity(id, Location::new("world", 15.0, 70.0, 5.0));
    scheduler.advance(10);
    assert_eq!(host.relocations(), 0);

    host.move_entity(id, Location::new("world", 60.0, 70.0, 5.0));
    scheduler.advance(10);
    assert_eq!(host.relocations(), 1);
    assert_eq!(host.entity_position(id), Some(loc.anchor()));
}

/// Test: an entity in another world counts as strayed.
#[test]
fn test_other_world_relocated() {
    let (service, scheduler, host, loc) = setup();
    scheduler.advance(1);
    let id = only_entity(&service, &loc);

    host.move_entity(id, Location::new("nether", 5.0, 70.0, 5.0));
    scheduler.advance(10);
    assert_eq!(host.entity_position(id), Some(loc.anchor()));
}

/// Test: a vanished entity is pruned from the set, the index and the count.
#[test]
fn test_vanished_entity_pruned() {
    let (service, scheduler, host, loc) = setup();
    scheduler.advance(1);
    let id = only_entity(&service, &loc);
    assert_eq!(service.registry().count(&loc), 1);

    assert!(host.despawn(id));
    scheduler.advance(10);

    assert!(service.registry().leashed(&loc).is_empty());
    assert!(service.registry().entity(id).is_none());
    assert_eq!(service.registry().count(&loc), 0);
}

/// Test: deleting the spawner stops its leash loop.
#[test]
fn test_leash_loop_stops_with_spawner() {
    let (service, scheduler, _host, loc) = setup();
    scheduler.advance(1);
    let leash = service.registry().leash_task(&loc).unwrap();

    assert!(service.delete_spawner(&loc));
    assert!(!scheduler.is_scheduled(leash));
    scheduler.advance(20);
    assert!(scheduler.is_empty());
}
