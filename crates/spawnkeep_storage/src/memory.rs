//! # In-Memory Store
//!
//! Transactional two-table store kept in memory, with fault injection for
//! the failure paths of save and load. The store itself moves into the
//! persistence worker; a [`MemoryHandle`] stays with the caller to inspect
//! rows and arm faults.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use spawnkeep_shared::{SpawnerId, STATEMENT_TIMEOUT_SECS};

use crate::backend::{timed, Storage};
use crate::error::{StorageError, StorageResult};
use crate::schema::{EntityRow, SpawnerRow, Table, Tables};

/// Call counters of a [`MemoryStore`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Size of every accepted spawner batch.
    pub spawner_batches: Vec<usize>,
    /// Size of every accepted entity batch.
    pub entity_batches: Vec<usize>,
    /// Successful truncates.
    pub truncates: u32,
    /// Successful commits.
    pub commits: u32,
    /// Reconnects.
    pub resets: u32,
}

#[derive(Debug, Default)]
struct Faults {
    truncate_failures: u32,
    spawner_inserts_left: Option<u32>,
    entity_inserts_left: Option<u32>,
    failing_reads: HashSet<Table>,
    statement_delay: Duration,
}

#[derive(Debug, Default)]
struct MemoryState {
    committed: Tables,
    schema_ready: bool,
    faults: Faults,
    stats: MemoryStats,
}

/// In-memory [`Storage`].
#[derive(Debug)]
pub struct MemoryStore {
    shared: Arc<Mutex<MemoryState>>,
    tx: Option<Tables>,
    timeout: Duration,
}

/// Inspection and fault-injection handle of a [`MemoryStore`].
#[derive(Clone, Debug)]
pub struct MemoryHandle {
    shared: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with the default statement timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(STATEMENT_TIMEOUT_SECS))
    }

    /// Creates an empty store with a custom statement timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Mutex::new(MemoryState::default())),
            tx: None,
            timeout,
        }
    }

    /// Handle that outlives the store's move into the worker.
    #[must_use]
    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn run<T>(
        &mut self,
        statement: impl FnOnce(&mut MemoryState, &mut Option<Tables>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let shared = Arc::clone(&self.shared);
        let tx = &mut self.tx;
        timed(self.timeout, move || {
            let delay = shared.lock().faults.statement_delay;
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            let mut state = shared.lock();
            statement(&mut state, tx)
        })
    }
}

/// Tables a write lands in: the open transaction, else committed state.
fn target<'a>(state: &'a mut MemoryState, tx: &'a mut Option<Tables>) -> &'a mut Tables {
    match tx {
        Some(tables) => tables,
        None => &mut state.committed,
    }
}

/// Consumes one allowance; `Some(0)` means the next call fails.
fn take_allowance(left: &mut Option<u32>) -> bool {
    match left {
        Some(0) => false,
        Some(n) => {
            *n -= 1;
            true
        }
        None => true,
    }
}

impl Storage for MemoryStore {
    fn ensure_schema(&mut self) -> StorageResult<()> {
        self.run(|state, _| {
            state.schema_ready = true;
            Ok(())
        })
    }

    fn begin(&mut self) -> StorageResult<()> {
        self.run(|state, tx| {
            if tx.is_some() {
                return Err(StorageError::Unavailable("transaction already open".to_string()));
            }
            *tx = Some(state.committed.clone());
            Ok(())
        })
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.run(|state, tx| {
            let tables = tx
                .take()
                .ok_or_else(|| StorageError::Unavailable("no open transaction".to_string()))?;
            state.committed = tables;
            state.stats.commits += 1;
            Ok(())
        })
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.tx = None;
        Ok(())
    }

    fn truncate(&mut self, table: Table) -> StorageResult<()> {
        self.run(|state, tx| {
            if state.faults.truncate_failures > 0 {
                state.faults.truncate_failures -= 1;
                return Err(StorageError::Unavailable(format!(
                    "connection lost truncating {table}"
                )));
            }
            target(state, tx).truncate(table);
            state.stats.truncates += 1;
            Ok(())
        })
    }

    fn insert_spawners(&mut self, rows: &[SpawnerRow]) -> StorageResult<()> {
        self.run(|state, tx| {
            if !take_allowance(&mut state.faults.spawner_inserts_left) {
                return Err(StorageError::Unavailable("spawner batch rejected".to_string()));
            }
            state.stats.spawner_batches.push(rows.len());
            target(state, tx).insert_spawners(rows);
            Ok(())
        })
    }

    fn insert_entities(&mut self, rows: &[EntityRow]) -> StorageResult<()> {
        self.run(|state, tx| {
            if !take_allowance(&mut state.faults.entity_inserts_left) {
                return Err(StorageError::Unavailable("entity batch rejected".to_string()));
            }
            state.stats.entity_batches.push(rows.len());
            target(state, tx).insert_entities(rows);
            Ok(())
        })
    }

    fn read_spawners(&mut self) -> StorageResult<Vec<SpawnerRow>> {
        self.run(|state, tx| {
            if state.faults.failing_reads.contains(&Table::Spawners) {
                return Err(StorageError::Unavailable("cannot read Spawners".to_string()));
            }
            Ok(target(state, tx).spawners.values().cloned().collect())
        })
    }

    fn read_entities(&mut self) -> StorageResult<Vec<EntityRow>> {
        self.run(|state, tx| {
            if state.faults.failing_reads.contains(&Table::Entities) {
                return Err(StorageError::Unavailable("cannot read Entities".to_string()));
            }
            Ok(target(state, tx).entities.values().cloned().collect())
        })
    }

    fn upsert_spawner(&mut self, row: &SpawnerRow) -> StorageResult<()> {
        self.run(|state, tx| {
            target(state, tx).insert_spawners(std::slice::from_ref(row));
            Ok(())
        })
    }

    fn delete_spawner(&mut self, id: SpawnerId) -> StorageResult<()> {
        self.run(|state, tx| {
            target(state, tx).delete_spawner(id);
            Ok(())
        })
    }

    fn reset(&mut self) -> StorageResult<()> {
        self.tx = None;
        self.shared.lock().stats.resets += 1;
        Ok(())
    }
}

impl MemoryHandle {
    /// New connection to the same data, as after a restart.
    #[must_use]
    pub fn reopen(&self) -> MemoryStore {
        MemoryStore {
            shared: Arc::clone(&self.shared),
            tx: None,
            timeout: Duration::from_secs(STATEMENT_TIMEOUT_SECS),
        }
    }

    /// Committed spawner rows.
    #[must_use]
    pub fn spawners(&self) -> Vec<SpawnerRow> {
        self.shared.lock().committed.spawners.values().cloned().collect()
    }

    /// Committed entity rows.
    #[must_use]
    pub fn entities(&self) -> Vec<EntityRow> {
        self.shared.lock().committed.entities.values().cloned().collect()
    }

    /// Returns true once `ensure_schema` ran.
    #[must_use]
    pub fn schema_ready(&self) -> bool {
        self.shared.lock().schema_ready
    }

    /// Call counters.
    #[must_use]
    pub fn stats(&self) -> MemoryStats {
        self.shared.lock().stats.clone()
    }

    /// Writes rows straight into committed state.
    pub fn seed(&self, spawners: &[SpawnerRow], entities: &[EntityRow]) {
        let mut state = self.shared.lock();
        state.committed.insert_spawners(spawners);
        state.committed.insert_entities(entities);
    }

    /// Fails the next `times` truncates.
    pub fn fail_truncates(&self, times: u32) {
        self.shared.lock().faults.truncate_failures = times;
    }

    /// Accepts `batches` more spawner batches, then fails every one.
    pub fn fail_spawner_inserts_after(&self, batches: u32) {
        self.shared.lock().faults.spawner_inserts_left = Some(batches);
    }

    /// Accepts `batches` more entity batches, then fails every one.
    pub fn fail_entity_inserts_after(&self, batches: u32) {
        self.shared.lock().faults.entity_inserts_left = Some(batches);
    }

    /// Fails every read of a table.
    pub fn fail_reads(&self, table: Table) {
        self.shared.lock().faults.failing_reads.insert(table);
    }

    /// Delays every statement.
    pub fn set_statement_delay(&self, delay: Duration) {
        self.shared.lock().faults.statement_delay = delay;
    }

    /// Disarms every fault.
    pub fn clear_faults(&self) {
        self.shared.lock().faults = Faults::default();
    }
}
