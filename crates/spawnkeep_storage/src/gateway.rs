//! # Persistence Gateway
//!
//! Shutdown snapshot and startup reconciliation.
//!
//! ## Save
//!
//! ```text
//! main:   snapshot indices into rows (entity positions from the host)
//! worker: BEGIN; TRUNCATE Spawners; TRUNCATE Entities; COMMIT
//!           └─ failure: reset, retry once, then abort the save
//!         BEGIN; INSERT Entities (batches); COMMIT
//!         BEGIN; INSERT Spawners (batches); COMMIT
//! ```
//!
//! A failed batch stops that table only. Batches already sent in its
//! transaction are still committed.
//!
//! ## Load
//!
//! Rows are read on the worker, then reconciled on the calling context:
//! spawners are registered with a zero population and their loops started,
//! then each entity row is checked against the live world. Rows whose entity
//! no longer resolves are dropped; the population is recomputed from the
//! rows that survive.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use spawnkeep_core::{EntityRecord, SpawnerService};
use spawnkeep_shared::{SpawnReason, SpawnerId, SpawnerLocation, INSERT_BATCH_SIZE};
use tracing::{debug, error, info, warn};

use crate::backend::Storage;
use crate::error::StorageResult;
use crate::schema::{EntityRow, SpawnerRow, Table};
use crate::worker::{JobHandle, PersistenceWorker};

/// Gateway configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Rows per insert batch.
    pub batch_size: usize,
    /// How long `load` waits for the worker.
    pub load_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            batch_size: INSERT_BATCH_SIZE,
            load_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of one table's inserts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableWrite {
    /// Rows committed.
    pub written: usize,
    /// Batches sent.
    pub flushes: usize,
    /// A batch or the commit failed.
    pub failed: bool,
}

/// Outcome of a save.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Truncate attempts (1 or 2).
    pub truncate_attempts: u32,
    /// The truncate failed twice; nothing was written.
    pub aborted: bool,
    /// Spawner table inserts.
    pub spawners: TableWrite,
    /// Entity table inserts.
    pub entities: TableWrite,
    /// Entity rows skipped (unknown type or unresolvable position).
    pub entities_skipped: usize,
    /// Entity rows whose spawner was gone, written as `UNKNOWN`.
    pub downgraded: usize,
}

/// Outcome of a load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Spawners registered.
    pub spawners_loaded: usize,
    /// Spawner rows skipped (unknown type).
    pub spawners_skipped: usize,
    /// Entities tracked.
    pub entities_loaded: usize,
    /// Entity rows dropped (no live entity, unknown type, setup refused).
    pub entities_discarded: usize,
    /// Entity rows whose spawner was not loaded, tracked as `UNKNOWN`.
    pub downgraded: usize,
    /// The spawner table could not be read.
    pub spawner_table_failed: bool,
    /// The entity table could not be read.
    pub entity_table_failed: bool,
}

/// Rows captured on the main context for a save.
struct Snapshot {
    spawners: Vec<SpawnerRow>,
    entities: Vec<EntityRow>,
    skipped: usize,
    downgraded: usize,
}

/// Bridges the indices and the persistence worker.
pub struct PersistenceGateway {
    service: Arc<SpawnerService>,
    worker: Arc<PersistenceWorker>,
    config: GatewayConfig,
}

impl PersistenceGateway {
    /// Creates a gateway.
    #[must_use]
    pub fn new(service: Arc<SpawnerService>, worker: Arc<PersistenceWorker>, config: GatewayConfig) -> Self {
        Self {
            service,
            worker,
            config,
        }
    }

    /// The worker jobs run on.
    #[must_use]
    pub fn worker(&self) -> &Arc<PersistenceWorker> {
        &self.worker
    }

    /// Creates both tables if missing and waits for it.
    ///
    /// # Errors
    ///
    /// Whatever the store or the worker reported.
    pub fn ensure_schema(&self) -> StorageResult<()> {
        self.worker
            .submit("ensure schema", |storage: &mut dyn Storage| storage.ensure_schema())?
            .wait_for(self.config.load_timeout)?
    }

    // =========================================================================
    // Save
    // =========================================================================

    /// Snapshots both indices and queues the write.
    ///
    /// # Errors
    ///
    /// [`StorageError::Backpressure`](crate::StorageError::Backpressure) or
    /// [`StorageError::WorkerGone`](crate::StorageError::WorkerGone) if the
    /// job could not be queued. Failures of the write itself are in the
    /// report.
    pub fn save(&self) -> StorageResult<JobHandle<SaveReport>> {
        let snapshot = self.snapshot();
        debug!(
            "Saving {} spawners and {} entities",
            snapshot.spawners.len(),
            snapshot.entities.len()
        );
        let batch_size = self.config.batch_size.max(1);
        self.worker.submit("save", move |storage: &mut dyn Storage| {
            write_snapshot(storage, snapshot, batch_size)
        })
    }

    fn snapshot(&self) -> Snapshot {
        let registry = self.service.registry();
        let types = self.service.types();
        let host = self.service.host();

        let records = registry.spawners();
        let live: HashMap<SpawnerLocation, SpawnerId> = records
            .iter()
            .map(|record| (record.location.clone(), record.id))
            .collect();
        let spawners = records.iter().map(SpawnerRow::from_record).collect();

        let mut entities = Vec::new();
        let mut skipped = 0;
        let mut downgraded = 0;
        for (id, record) in registry.entities() {
            if !types.contains(record.type_name()) {
                warn!("Not saving {id}: unknown type {}", record.type_name());
                skipped += 1;
                continue;
            }
            let Some(position) = host.entity_position(id) else {
                warn!("Not saving {id}: it no longer resolves");
                skipped += 1;
                continue;
            };

            let (reason, spawner_id) = match record.origin() {
                Some(origin) => match live.get(origin) {
                    Some(spawner_id) => (SpawnReason::Spawner, Some(*spawner_id)),
                    None => {
                        debug!("Spawner of {id} at {origin} is gone, saving it as UNKNOWN");
                        downgraded += 1;
                        (SpawnReason::Unknown, None)
                    }
                },
                None => (record.reason(), None),
            };

            let chunk = position.chunk();
            entities.push(EntityRow {
                id,
                type_name: record.type_name().to_string(),
                world: position.world,
                chunk_x: chunk.x,
                chunk_z: chunk.z,
                reason,
                spawner_id,
            });
        }

        Snapshot {
            spawners,
            entities,
            skipped,
            downgraded,
        }
    }

    // =========================================================================
    // Load
    // =========================================================================

    /// Reads both tables and rebuilds the indices against the live world.
    ///
    /// A table that cannot be read is treated as empty.
    ///
    /// # Errors
    ///
    /// [`StorageError::Timeout`](crate::StorageError::Timeout) if the worker did not answer within the
    /// load timeout, or the job could not be queued.
    pub fn load(&self) -> StorageResult<LoadReport> {
        let (spawner_rows, entity_rows) = self
            .worker
            .submit("load", |storage: &mut dyn Storage| {
                (storage.read_spawners(), storage.read_entities())
            })?
            .wait_for(self.config.load_timeout)?;

        let mut report = LoadReport::default();
        let loaded = self.load_spawners(spawner_rows, &mut report);
        self.load_entities(entity_rows, &loaded, &mut report);

        info!(
            "Loaded {} spawners ({} skipped) and {} entities ({} discarded, {} downgraded)",
            report.spawners_loaded,
            report.spawners_skipped,
            report.entities_loaded,
            report.entities_discarded,
            report.downgraded
        );
        Ok(report)
    }

    fn load_spawners(
        &self,
        rows: StorageResult<Vec<SpawnerRow>>,
        report: &mut LoadReport,
    ) -> HashMap<SpawnerId, SpawnerLocation> {
        let mut loaded = HashMap::new();
        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                error!("Could not read {}, starting without spawners: {e}", Table::Spawners);
                report.spawner_table_failed = true;
                return loaded;
            }
        };

        for row in rows {
            let record = row.into_record();
            let (id, location) = (record.id, record.location.clone());
            match self.service.register_loaded(record) {
                Ok(()) => {
                    loaded.insert(id, location);
                    report.spawners_loaded += 1;
                }
                Err(e) => {
                    warn!("Skipping stored spawner {id} at {location}: {e}");
                    report.spawners_skipped += 1;
                }
            }
        }
        loaded
    }

    fn load_entities(
        &self,
        rows: StorageResult<Vec<EntityRow>>,
        loaded: &HashMap<SpawnerId, SpawnerLocation>,
        report: &mut LoadReport,
    ) {
        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                error!("Could not read {}, starting without entities: {e}", Table::Entities);
                report.entity_table_failed = true;
                return;
            }
        };

        let host = self.service.host();
        for row in rows {
            let origin = match (row.reason, row.spawner_id) {
                (SpawnReason::Spawner, Some(spawner_id)) => {
                    let origin = loaded.get(&spawner_id).cloned();
                    if origin.is_none() {
                        warn!("Spawner {spawner_id} of {} was not loaded, tracking it as UNKNOWN", row.id);
                        report.downgraded += 1;
                    }
                    origin
                }
                (SpawnReason::Spawner, None) => {
                    warn!("{} is marked SPAWNER without a spawner id, tracking it as UNKNOWN", row.id);
                    report.downgraded += 1;
                    None
                }
                _ => None,
            };

            host.force_load_chunk(&row.world, row.chunk());
            if !host.entity_exists(row.id) {
                info!("Discarding stored {} {}: it no longer exists", row.type_name, row.id);
                report.entities_discarded += 1;
                continue;
            }
            if !self.service.types().contains(&row.type_name) {
                warn!("Discarding stored {}: unknown type {}", row.id, row.type_name);
                report.entities_discarded += 1;
                continue;
            }
            let strategy = self.service.strategies().get(&row.type_name);
            if !strategy.setup(host.as_ref(), row.id) {
                warn!("Discarding stored {} {}: setup failed", row.type_name, row.id);
                report.entities_discarded += 1;
                continue;
            }

            let record = match origin {
                Some(location) => EntityRecord::from_spawner(row.type_name, location),
                None => EntityRecord::unattributed(row.type_name, row.reason),
            };
            self.service.track_loaded(row.id, record);
            report.entities_loaded += 1;
        }
    }
}

// =============================================================================
// Worker side
// =============================================================================

/// Runs on the worker: truncate, then rewrite both tables.
fn write_snapshot(storage: &mut dyn Storage, snapshot: Snapshot, batch_size: usize) -> SaveReport {
    let mut report = SaveReport {
        truncate_attempts: 1,
        entities_skipped: snapshot.skipped,
        downgraded: snapshot.downgraded,
        ..SaveReport::default()
    };

    if let Err(first) = truncate_all(storage) {
        warn!("Truncating tables failed ({first}), reconnecting and retrying");
        if let Err(e) = storage.reset() {
            warn!("Reconnect failed: {e}");
        }
        report.truncate_attempts = 2;
        if let Err(second) = truncate_all(storage) {
            error!("Save aborted, truncating tables failed twice: {second}");
            report.aborted = true;
            return report;
        }
    }

    report.entities = insert_batched(storage, Table::Entities, &snapshot.entities, batch_size, |s, rows| {
        s.insert_entities(rows)
    });
    report.spawners = insert_batched(storage, Table::Spawners, &snapshot.spawners, batch_size, |s, rows| {
        s.insert_spawners(rows)
    });

    info!(
        "Saved {} spawners and {} entities ({} skipped, {} downgraded)",
        report.spawners.written, report.entities.written, report.entities_skipped, report.downgraded
    );
    report
}

fn truncate_all(storage: &mut dyn Storage) -> StorageResult<()> {
    let result = storage.begin().and_then(|()| {
        storage.truncate(Table::Spawners)?;
        storage.truncate(Table::Entities)?;
        storage.commit()
    });
    if result.is_err() {
        storage.rollback().ok();
    }
    result
}

/// Inserts `rows` in batches inside one transaction.
///
/// Stops at the first failed batch and commits what was sent before it.
fn insert_batched<R>(
    storage: &mut dyn Storage,
    table: Table,
    rows: &[R],
    batch_size: usize,
    insert: impl Fn(&mut dyn Storage, &[R]) -> StorageResult<()>,
) -> TableWrite {
    let mut write = TableWrite::default();
    if let Err(e) = storage.begin() {
        error!("Could not open a transaction for {table}: {e}");
        write.failed = true;
        return write;
    }

    let mut sent = 0;
    for batch in rows.chunks(batch_size) {
        match insert(storage, batch) {
            Ok(()) => {
                sent += batch.len();
                write.flushes += 1;
            }
            Err(e) => {
                error!("Writing {table} failed after {sent} of {} rows: {e}", rows.len());
                write.failed = true;
                break;
            }
        }
    }

    match storage.commit() {
        Ok(()) => write.written = sent,
        Err(e) => {
            error!("Committing {table} failed, {sent} rows lost: {e}");
            storage.rollback().ok();
            write.failed = true;
        }
    }
    write
}
