//! # Persistence Gateway Integration Test
//!
//! Save and load against the memory store and the simulated host, across
//! simulated restarts.

use std::sync::Arc;
use std::time::Duration;

use spawnkeep_core::{
    HostWorld, Registry, ServiceSettings, SimWorld, SpawnerService, StrategyRegistry,
    TickScheduler, TypeConfigStore,
};
use spawnkeep_shared::{
    EntityId, Location, SpawnReason, SpawnerId, SpawnerLocation, SpawnerTypeConfig, WorldId,
};
use spawnkeep_storage::{
    EntityRow, GatewayConfig, IncrementalSync, MemoryHandle, MemoryStore, PersistenceGateway,
    PersistenceWorker, SpawnerRow, StorageError, Table, WorkerConfig,
};

/// One process lifetime.
struct Boot {
    service: Arc<SpawnerService>,
    scheduler: Arc<TickScheduler>,
    gateway: PersistenceGateway,
}

fn quick_wisp() -> SpawnerTypeConfig {
    SpawnerTypeConfig {
        warmup: 0,
        cooldown: 1,
        check_for_players: false,
        ..SpawnerTypeConfig::wisp()
    }
}

fn boot_with(host: &Arc<SimWorld>, store: MemoryStore, config: GatewayConfig) -> Boot {
    let types = Arc::new(TypeConfigStore::new());
    types.register("wisp", quick_wisp()).unwrap();
    types.register("fire_wisp", quick_wisp()).unwrap();

    let scheduler = Arc::new(TickScheduler::new());
    let service = Arc::new(SpawnerService::new(
        types,
        Arc::new(Registry::new()),
        Arc::new(StrategyRegistry::new()),
        host.clone(),
        scheduler.clone(),
        ServiceSettings {
            seed: Some(3),
            ..ServiceSettings::default()
        },
    ));
    let worker = Arc::new(PersistenceWorker::start(Box::new(store), &WorkerConfig::default()).unwrap());
    let gateway = PersistenceGateway::new(Arc::clone(&service), worker, config);
    gateway.ensure_schema().unwrap();

    Boot {
        service,
        scheduler,
        gateway,
    }
}

fn boot(host: &Arc<SimWorld>, store: MemoryStore) -> Boot {
    boot_with(host, store, GatewayConfig::default())
}

fn fresh() -> (Arc<SimWorld>, MemoryHandle, Boot) {
    let host = Arc::new(SimWorld::with_world("world"));
    let store = MemoryStore::new();
    let handle = store.handle();
    let boot = boot(&host, store);
    (host, handle, boot)
}

fn spawner_row(type_name: &str, x: i32, has_leash: bool) -> SpawnerRow {
    SpawnerRow {
        id: SpawnerId::random(),
        type_name: type_name.to_string(),
        world: WorldId::new("world"),
        x,
        y: 64,
        z: 0,
        has_leash,
    }
}

fn entity_row(id: EntityId, reason: SpawnReason, spawner_id: Option<SpawnerId>) -> EntityRow {
    EntityRow {
        id,
        type_name: "wisp".to_string(),
        world: WorldId::new("world"),
        chunk_x: 0,
        chunk_z: 0,
        reason,
        spawner_id,
    }
}

/// Test: save, restart, load gives back the same spawners, entities and counts.
#[test]
fn test_round_trip() {
    let (host, store, first) = fresh();
    let leashed = Location::new("world", 0.0, 64.0, 0.0);
    let plain = Location::new("world", 100.0, 64.0, 0.0);
    first.service.register_spawner("wisp", &leashed, Some(true)).unwrap();
    first.service.register_spawner("fire_wisp", &plain, Some(false)).unwrap();
    first.scheduler.advance(3);
    first
        .service
        .summon("wisp", &Location::new("world", 50.0, 64.0, 0.0), SpawnReason::Command)
        .unwrap();

    let before_spawners = first.service.list_spawners();
    let before_entities = first.service.registry().entities();
    assert_eq!(before_entities.len(), 7);

    first.service.stop_all();
    let report = first.gateway.save().unwrap().wait().unwrap();
    assert!(!report.aborted);
    assert_eq!(report.truncate_attempts, 1);
    assert_eq!(report.spawners.written, 2);
    assert_eq!(report.entities.written, 7);
    first.gateway.worker().drain().unwrap();
    drop(first);

    let second = boot(&host, store.reopen());
    let loaded = second.gateway.load().unwrap();
    assert_eq!(loaded.spawners_loaded, 2);
    assert_eq!(loaded.entities_loaded, 7);
    assert_eq!(loaded.entities_discarded, 0);

    assert_eq!(second.service.list_spawners(), before_spawners);
    assert_eq!(second.service.registry().entities(), before_entities);

    let leashed = SpawnerLocation::normalize(&leashed);
    let plain = SpawnerLocation::normalize(&plain);
    assert_eq!(second.service.registry().count(&leashed), 3);
    assert_eq!(second.service.registry().count(&plain), 3);
    assert_eq!(second.service.registry().leashed(&leashed).len(), 3);
    assert!(second.service.registry().leashed(&plain).is_empty());

    // Loaded spawners are live again.
    assert!(second.service.registry().spawn_task(&plain).is_some());
    assert!(second.service.registry().leash_task(&leashed).is_some());
}

/// Test: three stored entities, one gone from the world, count is two.
#[test]
fn test_missing_entity_discarded_on_load() {
    let host = Arc::new(SimWorld::with_world("world"));
    let store = MemoryStore::new();
    let handle = store.handle();

    let spawner = spawner_row("wisp", 8, false);
    let at = Location::new("world", 8.0, 64.0, 0.0);
    let ids: Vec<EntityId> = (0..3).map(|_| host.insert_entity("wisp", at.clone())).collect();
    let rows: Vec<EntityRow> = ids
        .iter()
        .map(|id| entity_row(*id, SpawnReason::Spawner, Some(spawner.id)))
        .collect();
    handle.seed(&[spawner.clone()], &rows);
    assert!(host.despawn(ids[1]));

    let boot = boot(&host, store);
    let report = boot.gateway.load().unwrap();
    assert_eq!(report.entities_loaded, 2);
    assert_eq!(report.entities_discarded, 1);

    let location = spawner.location();
    assert_eq!(boot.service.registry().count(&location), 2);
    assert_eq!(boot.service.registry().spawned_by(&location).len(), 2);
    assert!(boot.service.registry().entity(ids[1]).is_none());
    assert!(!host.forced_chunks().is_empty());
}

/// Test: an entity pointing at a spawner that was not loaded becomes UNKNOWN.
#[test]
fn test_orphan_entity_downgraded_on_load() {
    let host = Arc::new(SimWorld::with_world("world"));
    let store = MemoryStore::new();
    let handle = store.handle();

    let id = host.insert_entity("wisp", Location::new("world", 1.0, 64.0, 1.0));
    handle.seed(&[], &[entity_row(id, SpawnReason::Spawner, Some(SpawnerId::random()))]);

    let boot = boot(&host, store);
    let report = boot.gateway.load().unwrap();
    assert_eq!(report.downgraded, 1);
    assert_eq!(report.entities_loaded, 1);

    let record = boot.service.registry().entity(id).unwrap();
    assert_eq!(record.reason(), SpawnReason::Unknown);
    assert!(record.origin().is_none());
}

/// Test: a stored spawner of an unregistered type is skipped.
#[test]
fn test_unknown_spawner_type_skipped() {
    let host = Arc::new(SimWorld::with_world("world"));
    let store = MemoryStore::new();
    store
        .handle()
        .seed(&[spawner_row("ghost", 0, false), spawner_row("wisp", 4, false)], &[]);

    let boot = boot(&host, store);
    let report = boot.gateway.load().unwrap();
    assert_eq!(report.spawners_loaded, 1);
    assert_eq!(report.spawners_skipped, 1);
    assert_eq!(boot.service.list_spawners()[0].type_name, "wisp");
}

/// Test: an unreadable table starts empty, the other still loads.
#[test]
fn test_table_read_failure_isolated() {
    let host = Arc::new(SimWorld::with_world("world"));
    let store = MemoryStore::new();
    let handle = store.handle();
    let id = host.insert_entity("wisp", Location::new("world", 0.0, 64.0, 0.0));
    handle.seed(
        &[spawner_row("wisp", 0, false)],
        &[entity_row(id, SpawnReason::Natural, None)],
    );
    handle.fail_reads(Table::Entities);

    let boot = boot(&host, store);
    let report = boot.gateway.load().unwrap();
    assert!(report.entity_table_failed);
    assert!(!report.spawner_table_failed);
    assert_eq!(report.spawners_loaded, 1);
    assert_eq!(boot.service.registry().entity_count(), 0);
}

/// Test: a slow store makes load fail with a timeout instead of hanging.
#[test]
fn test_load_timeout() {
    let host = Arc::new(SimWorld::with_world("world"));
    let store = MemoryStore::new();
    let handle = store.handle();
    let boot = boot_with(
        &host,
        store,
        GatewayConfig {
            load_timeout: Duration::from_millis(20),
            ..GatewayConfig::default()
        },
    );

    handle.set_statement_delay(Duration::from_millis(200));
    assert!(matches!(boot.gateway.load(), Err(StorageError::Timeout(_))));
}

/// Test: one truncate failure is retried after a reconnect.
#[test]
fn test_truncate_retried_once() {
    let (_host, store, boot) = fresh();
    boot.service
        .register_spawner("wisp", &Location::new("world", 0.0, 64.0, 0.0), None)
        .unwrap();
    store.fail_truncates(1);

    let report = boot.gateway.save().unwrap().wait().unwrap();
    assert_eq!(report.truncate_attempts, 2);
    assert!(!report.aborted);
    assert_eq!(report.spawners.written, 1);
    assert_eq!(store.stats().resets, 1);
    assert_eq!(store.spawners().len(), 1);
}

/// Test: two truncate failures abort the save and write nothing.
#[test]
fn test_truncate_failing_twice_aborts() {
    let (_host, store, boot) = fresh();
    let stale = spawner_row("wisp", 42, false);
    store.seed(&[stale.clone()], &[]);
    boot.service
        .register_spawner("wisp", &Location::new("world", 0.0, 64.0, 0.0), None)
        .unwrap();
    store.fail_truncates(2);

    let report = boot.gateway.save().unwrap().wait().unwrap();
    assert!(report.aborted);
    assert_eq!(report.spawners.written, 0);
    assert_eq!(report.entities.written, 0);
    assert_eq!(store.spawners(), vec![stale]);
    assert!(store.stats().spawner_batches.is_empty());
}

/// Test: 2,500 entities go out as 1000 + 1000 + 500.
#[test]
fn test_entity_batches() {
    let (_host, store, boot) = fresh();
    let at = Location::new("world", 0.0, 64.0, 0.0);
    for _ in 0..2500 {
        boot.service.summon("wisp", &at, SpawnReason::Natural).unwrap();
    }

    let report = boot.gateway.save().unwrap().wait().unwrap();
    assert_eq!(report.entities.written, 2500);
    assert_eq!(report.entities.flushes, 3);
    assert_eq!(store.stats().entity_batches, vec![1000, 1000, 500]);
    assert_eq!(store.entities().len(), 2500);
}

/// Test: a failed entity batch keeps earlier batches and the spawner table.
#[test]
fn test_entity_flush_failure_isolated() {
    let (_host, store, boot) = fresh();
    let at = Location::new("world", 0.0, 64.0, 0.0);
    boot.service.register_spawner("wisp", &at, Some(false)).unwrap();
    boot.service.stop_all();
    for _ in 0..2500 {
        boot.service.summon("wisp", &at, SpawnReason::Natural).unwrap();
    }
    store.fail_entity_inserts_after(1);

    let report = boot.gateway.save().unwrap().wait().unwrap();
    assert!(report.entities.failed);
    assert_eq!(report.entities.written, 1000);
    assert!(!report.spawners.failed);
    assert_eq!(report.spawners.written, 1);
    assert_eq!(store.entities().len(), 1000);
    assert_eq!(store.spawners().len(), 1);
}

/// Test: entities of a deleted spawner are saved as UNKNOWN with no spawner id.
#[test]
fn test_deleted_spawner_entities_saved_unknown() {
    let (_host, store, boot) = fresh();
    let at = Location::new("world", 0.0, 64.0, 0.0);
    boot.service.register_spawner("wisp", &at, Some(false)).unwrap();
    boot.scheduler.advance(2);
    assert!(boot.service.delete_spawner(&SpawnerLocation::normalize(&at)));

    let report = boot.gateway.save().unwrap().wait().unwrap();
    assert_eq!(report.entities.written, 2);
    let rows = store.entities();
    assert_eq!(rows.len(), 2);
    assert!(rows
        .iter()
        .all(|row| row.reason == SpawnReason::Unknown && row.spawner_id.is_none()));
}

/// Test: a spawner re-registered where one was deleted does not inherit the
/// old population, live or across a restart.
#[test]
fn test_reregistered_spawner_keeps_cap() {
    let (host, store, first) = fresh();
    let at = Location::new("world", 0.0, 64.0, 0.0);
    let location = SpawnerLocation::normalize(&at);
    let cap = quick_wisp().max_mobs;

    first.service.register_spawner("wisp", &at, Some(false)).unwrap();
    first.scheduler.advance(40);
    let old = first.service.registry().spawned_by(&location);
    assert_eq!(old.len(), cap as usize);

    assert!(first.service.delete_spawner(&location));
    assert!(first.service.registry().spawned_by(&location).is_empty());
    let replacement = first.service.register_spawner("wisp", &at, Some(false)).unwrap();
    first.scheduler.advance(40);
    assert_eq!(first.service.registry().count(&location), cap);

    // An old entity dying frees no slot at the new spawner.
    assert!(host.despawn(old[0]));
    assert!(first.service.entity_removed(old[0]));
    first.scheduler.advance(5);
    assert_eq!(first.service.registry().count(&location), cap);
    assert_eq!(first.service.registry().spawned_by(&location).len(), cap as usize);
    for id in &old[1..] {
        let record = first.service.registry().entity(*id).unwrap();
        assert_eq!(record.reason(), SpawnReason::Unknown);
        assert!(record.origin().is_none());
    }

    first.service.stop_all();
    let report = first.gateway.save().unwrap().wait().unwrap();
    assert_eq!(report.downgraded, 0);
    let rows = store.entities();
    let attributed = rows
        .iter()
        .filter(|row| row.spawner_id == Some(replacement))
        .count();
    assert_eq!(attributed, cap as usize);
    assert!(rows
        .iter()
        .filter(|row| old.contains(&row.id))
        .all(|row| row.reason == SpawnReason::Unknown && row.spawner_id.is_none()));
    first.gateway.worker().drain().unwrap();
    drop(first);

    let second = boot(&host, store.reopen());
    let loaded = second.gateway.load().unwrap();
    assert_eq!(loaded.entities_loaded, rows.len());
    assert_eq!(second.service.registry().count(&location), cap);
}

/// Test: entities that vanished before the save are skipped.
#[test]
fn test_vanished_entity_skipped_on_save() {
    let (host, store, boot) = fresh();
    let at = Location::new("world", 0.0, 64.0, 0.0);
    let id = boot.service.summon("wisp", &at, SpawnReason::Command).unwrap();
    boot.service.summon("wisp", &at, SpawnReason::Command).unwrap();
    assert!(host.despawn(id));
    assert!(!host.entity_exists(id));

    let report = boot.gateway.save().unwrap().wait().unwrap();
    assert_eq!(report.entities_skipped, 1);
    assert_eq!(store.entities().len(), 1);
}

/// Test: administrative changes reach storage without a full save.
#[test]
fn test_incremental_sync() {
    let (_host, store, boot) = fresh();
    boot.service
        .add_observer(Arc::new(IncrementalSync::new(Arc::clone(boot.gateway.worker()))));

    let at = Location::new("world", 0.0, 64.0, 0.0);
    let first = boot.service.register_spawner("wisp", &at, None).unwrap();
    boot.gateway.worker().drain().unwrap();
    assert_eq!(store.spawners().len(), 1);
    assert_eq!(store.spawners()[0].id, first);

    // Overwriting replaces the stored row.
    let second = boot.service.register_spawner("fire_wisp", &at, None).unwrap();
    boot.gateway.worker().drain().unwrap();
    let rows = store.spawners();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, second);

    assert!(boot.service.delete_spawner(&SpawnerLocation::normalize(&at)));
    boot.gateway.worker().drain().unwrap();
    assert!(store.spawners().is_empty());
}
