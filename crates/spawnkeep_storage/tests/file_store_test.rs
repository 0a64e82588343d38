//! # File Store Integration Test
//!
//! Committed tables survive a reopen; damaged files are reported, not
//! silently loaded.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use spawnkeep_core::{
    Registry, ServiceSettings, SimWorld, SpawnerService, StrategyRegistry, TickScheduler,
    TypeConfigStore,
};
use spawnkeep_shared::{Location, SpawnReason, SpawnerId, SpawnerLocation, SpawnerTypeConfig, WorldId};
use spawnkeep_storage::{
    FileStore, GatewayConfig, PersistenceGateway, PersistenceWorker, SpawnerRow, Storage,
    StorageError, WorkerConfig,
};

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("spawnkeep_{name}_{nanos}"))
}

fn row(x: i32) -> SpawnerRow {
    SpawnerRow {
        id: SpawnerId::random(),
        type_name: "wisp".to_string(),
        world: WorldId::new("world"),
        x,
        y: 64,
        z: -5,
        has_leash: x % 2 == 0,
    }
}

fn service(host: &Arc<SimWorld>) -> Arc<SpawnerService> {
    let types = Arc::new(TypeConfigStore::new());
    types
        .register(
            "wisp",
            SpawnerTypeConfig {
                warmup: 0,
                cooldown: 1,
                check_for_players: false,
                ..SpawnerTypeConfig::wisp()
            },
        )
        .unwrap();
    Arc::new(SpawnerService::new(
        types,
        Arc::new(Registry::new()),
        Arc::new(StrategyRegistry::new()),
        host.clone(),
        Arc::new(TickScheduler::new()),
        ServiceSettings::default(),
    ))
}

fn open_gateway(service: &Arc<SpawnerService>, dir: &Path) -> PersistenceGateway {
    let store = FileStore::open(dir).unwrap();
    let worker = PersistenceWorker::start(Box::new(store), &WorkerConfig::default()).unwrap();
    let gateway = PersistenceGateway::new(Arc::clone(service), Arc::new(worker), GatewayConfig::default());
    gateway.ensure_schema().unwrap();
    gateway
}

/// Test: committed rows are read back after reopening the directory.
#[test]
fn test_committed_rows_survive_reopen() {
    let dir = temp_dir("reopen");
    let rows: Vec<SpawnerRow> = (0..5).map(row).collect();
    {
        let mut store = FileStore::open(&dir).unwrap();
        store.ensure_schema().unwrap();
        store.begin().unwrap();
        store.insert_spawners(&rows).unwrap();
        store.commit().unwrap();
    }

    let mut store = FileStore::open(&dir).unwrap();
    let mut read = store.read_spawners().unwrap();
    read.sort_by_key(|r| r.x);
    assert_eq!(read, rows);

    // Writes outside a transaction are durable too.
    store.delete_spawner(rows[0].id).unwrap();
    drop(store);
    let mut store = FileStore::open(&dir).unwrap();
    assert_eq!(store.read_spawners().unwrap().len(), 4);

    fs::remove_dir_all(&dir).ok();
}

/// Test: a flipped byte makes the table read fail as corrupt until rewritten.
#[test]
fn test_damaged_table_reported() {
    let dir = temp_dir("damaged");
    {
        let mut store = FileStore::open(&dir).unwrap();
        store.begin().unwrap();
        store.insert_spawners(&[row(1), row(2)]).unwrap();
        store.commit().unwrap();
    }

    let path = dir.join("spawners.tbl");
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    let mut store = FileStore::open(&dir).unwrap();
    assert!(matches!(
        store.read_spawners(),
        Err(StorageError::Corrupt { .. })
    ));
    assert!(store.read_entities().unwrap().is_empty());

    store.begin().unwrap();
    store.truncate(spawnkeep_storage::Table::Spawners).unwrap();
    store.insert_spawners(&[row(3)]).unwrap();
    store.commit().unwrap();
    assert_eq!(store.read_spawners().unwrap().len(), 1);

    fs::remove_dir_all(&dir).ok();
}

/// Test: a full save and load through the worker against files on disk.
#[test]
fn test_save_and_load_from_disk() {
    let dir = temp_dir("gateway");
    let host = Arc::new(SimWorld::with_world("world"));
    let at = Location::new("world", 16.0, 70.0, 16.0);

    {
        let first = service(&host);
        first.register_spawner("wisp", &at, Some(true)).unwrap();
        first.summon("wisp", &at, SpawnReason::Natural).unwrap();
        first.stop_all();
        let gateway = open_gateway(&first, &dir);
        let report = gateway.save().unwrap().wait().unwrap();
        assert_eq!(report.spawners.written, 1);
        assert_eq!(report.entities.written, 1);
        gateway.worker().drain().unwrap();
    }

    let second = service(&host);
    let gateway = open_gateway(&second, &dir);
    let report = gateway.load().unwrap();
    assert_eq!(report.spawners_loaded, 1);
    assert_eq!(report.entities_loaded, 1);

    let spawners = second.list_spawners();
    assert_eq!(spawners.len(), 1);
    assert_eq!(spawners[0].location, SpawnerLocation::normalize(&at));
    assert!(spawners[0].has_leash);
    assert_eq!(second.registry().entities()[0].1.reason(), SpawnReason::Natural);

    fs::remove_dir_all(&dir).ok();
}
