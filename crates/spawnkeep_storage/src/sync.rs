//! # Incremental Sync
//!
//! Mirrors administrative spawner changes into storage as they happen, so a
//! crash between boots loses at most the entity table. Failures are logged
//! and never reach the caller.

use std::sync::Arc;

use spawnkeep_core::{SpawnerObserver, SpawnerRecord};
use tracing::warn;

use crate::backend::Storage;
use crate::schema::SpawnerRow;
use crate::worker::PersistenceWorker;

/// Queues an upsert or delete for every registered or deleted spawner.
pub struct IncrementalSync {
    worker: Arc<PersistenceWorker>,
}

impl IncrementalSync {
    /// Creates a sync observer feeding `worker`.
    #[must_use]
    pub fn new(worker: Arc<PersistenceWorker>) -> Self {
        Self { worker }
    }
}

impl SpawnerObserver for IncrementalSync {
    fn spawner_registered(&self, record: &SpawnerRecord) {
        let row = SpawnerRow::from_record(record);
        let submitted = self.worker.submit("upsert spawner", move |storage: &mut dyn Storage| {
            if let Err(e) = storage.upsert_spawner(&row) {
                warn!("Could not store spawner {}: {e}", row.id);
            }
        });
        if let Err(e) = submitted {
            warn!("Could not queue store of spawner {}: {e}", record.id);
        }
    }

    fn spawner_deleted(&self, record: &SpawnerRecord) {
        let id = record.id;
        let submitted = self.worker.submit("delete spawner", move |storage: &mut dyn Storage| {
            if let Err(e) = storage.delete_spawner(id) {
                warn!("Could not delete stored spawner {id}: {e}");
            }
        });
        if let Err(e) = submitted {
            warn!("Could not queue delete of spawner {id}: {e}");
        }
    }
}
