//! # Storage Seam
//!
//! The two-table transactional capability the gateway needs. Calls made
//! outside `begin`/`commit` apply immediately. Every call honours the
//! store's statement timeout: a call that takes longer fails with
//! [`StorageError::Timeout`].
//!
//! The timeout is measured, not enforced. It is checked once the call
//! returns, so a call that never returns holds the persistence worker
//! indefinitely.

use std::time::{Duration, Instant};

use spawnkeep_shared::SpawnerId;

use crate::error::{StorageError, StorageResult};
use crate::schema::{EntityRow, SpawnerRow, Table};

/// Durable storage for spawner and entity rows.
///
/// Owned by the persistence worker; never shared between threads.
///
/// Implementations report an overrun statement as
/// [`StorageError::Timeout`] after it completes. They must not block
/// without bound: nothing interrupts a call that is still running.
pub trait Storage: Send {
    /// Creates both tables if missing.
    fn ensure_schema(&mut self) -> StorageResult<()>;

    /// Opens a transaction.
    fn begin(&mut self) -> StorageResult<()>;

    /// Commits the open transaction.
    fn commit(&mut self) -> StorageResult<()>;

    /// Discards the open transaction.
    fn rollback(&mut self) -> StorageResult<()>;

    /// Deletes every row of a table.
    fn truncate(&mut self, table: Table) -> StorageResult<()>;

    /// Inserts one batch of spawner rows.
    fn insert_spawners(&mut self, rows: &[SpawnerRow]) -> StorageResult<()>;

    /// Inserts one batch of entity rows.
    fn insert_entities(&mut self, rows: &[EntityRow]) -> StorageResult<()>;

    /// Reads every spawner row.
    fn read_spawners(&mut self) -> StorageResult<Vec<SpawnerRow>>;

    /// Reads every entity row.
    fn read_entities(&mut self) -> StorageResult<Vec<EntityRow>>;

    /// Inserts or replaces one spawner row by id.
    fn upsert_spawner(&mut self, row: &SpawnerRow) -> StorageResult<()>;

    /// Deletes one spawner row by id.
    fn delete_spawner(&mut self, id: SpawnerId) -> StorageResult<()>;

    /// Drops any open transaction and reconnects.
    fn reset(&mut self) -> StorageResult<()>;
}

/// Runs one statement and fails it if it overran `timeout`.
///
/// The statement always runs to completion; elapsed time is only compared
/// after it returns. An error from the statement wins over the timeout.
pub(crate) fn timed<T>(timeout: Duration, statement: impl FnOnce() -> StorageResult<T>) -> StorageResult<T> {
    let start = Instant::now();
    let result = statement()?;
    if start.elapsed() > timeout {
        return Err(StorageError::Timeout(timeout));
    }
    Ok(result)
}
