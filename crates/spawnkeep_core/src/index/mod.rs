//! # Spawner and Entity Indices
//!
//! [`Registry`] owns both indices, each behind its own lock. Operations that
//! touch both take the spawner index first, then the entity index. The
//! spawn and leash loops run on the main context; the persistence worker
//! only ever sees row snapshots, never the locks.
//!
//! ## Invariants
//!
//! - An entity attributed to a spawn point references a registered spawner.
//!   Tracking one whose spawner is gone records it as `Unknown`.
//! - Leash sets only hold identities present in the entity index.
//! - Deleting a spawner cancels its loops before its entries disappear.
//! - Deleting or overwriting a spawner downgrades its entities to `Unknown`,
//!   so a later spawner at the same block never inherits them.

mod entities;
mod spawners;

pub use entities::{EntityIndex, EntityRecord};
pub use spawners::{RemovedSpawner, SpawnerIndex, SpawnerRecord};

use parking_lot::{RwLock, RwLockReadGuard};
use spawnkeep_shared::{EntityId, SpawnerId, SpawnerLocation};
use tracing::debug;

use crate::scheduler::{TaskHandle, TaskScheduler};

/// Outcome of [`Registry::track_entity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tracked {
    /// Counted against its spawn point and added to the leash set.
    Leashed,
    /// Counted against its spawn point.
    Counted,
    /// Tracked without a spawn point.
    Unattributed,
    /// Referenced a spawn point that is not registered; tracked as `Unknown`.
    Orphaned,
}

/// Both indices, shared between the service, the loops and the gateway.
#[derive(Debug, Default)]
pub struct Registry {
    spawners: RwLock<SpawnerIndex>,
    entities: RwLock<EntityIndex>,
}

impl Registry {
    /// Creates empty indices.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the spawner index.
    pub fn spawner_index(&self) -> RwLockReadGuard<'_, SpawnerIndex> {
        self.spawners.read()
    }

    /// Read access to the entity index.
    pub fn entity_index(&self) -> RwLockReadGuard<'_, EntityIndex> {
        self.entities.read()
    }

    // =========================================================================
    // Spawners
    // =========================================================================

    /// Registers a spawner, overwriting any at the same location.
    ///
    /// Each displaced spawner loses its count and leash set, and the entities
    /// it produced become `Unknown`. The displaced records are returned with
    /// their loop handles, which the caller cancels.
    pub fn insert_spawner(&self, record: SpawnerRecord) -> Vec<RemovedSpawner> {
        let mut spawners = self.spawners.write();
        let displaced = spawners.insert(record);
        if !displaced.is_empty() {
            let mut entities = self.entities.write();
            for old in displaced.iter().filter_map(|removed| removed.record.as_ref()) {
                let orphaned = entities.orphan_spawned_by(&old.location);
                debug!("Displaced spawner {} at {} left {orphaned} entities", old.id, old.location);
            }
        }
        displaced
    }

    /// Looks up a spawner by location.
    #[must_use]
    pub fn spawner(&self, location: &SpawnerLocation) -> Option<SpawnerRecord> {
        self.spawners.read().get(location).cloned()
    }

    /// Looks up the location of a spawner by id.
    #[must_use]
    pub fn location_of(&self, id: SpawnerId) -> Option<SpawnerLocation> {
        self.spawners.read().location_of(id).cloned()
    }

    /// Every spawner, ordered by location.
    #[must_use]
    pub fn spawners(&self) -> Vec<SpawnerRecord> {
        let mut records: Vec<SpawnerRecord> = self.spawners.read().records().cloned().collect();
        records.sort_by(|a, b| a.location.cmp(&b.location));
        records
    }

    /// Number of registered spawners.
    #[must_use]
    pub fn spawner_count(&self) -> usize {
        self.spawners.read().len()
    }

    /// Deletes a spawner.
    ///
    /// Both loops are cancelled while the index is still locked, then the
    /// record, count, leash set and handles are removed and the entities it
    /// produced become `Unknown`. Returns false and changes nothing if no
    /// spawner is registered at the location.
    pub fn delete_spawner(&self, location: &SpawnerLocation, scheduler: &dyn TaskScheduler) -> bool {
        let mut spawners = self.spawners.write();
        if !spawners.contains(location) {
            return false;
        }

        if let Some(handle) = spawners.spawn_task(location) {
            scheduler.cancel(handle);
        }
        if let Some(handle) = spawners.leash_task(location) {
            scheduler.cancel(handle);
        }

        let removed = spawners.remove(location);
        let orphaned = self.entities.write().orphan_spawned_by(location);
        debug!(
            "Removed spawner {location} ({:?}), {orphaned} entities orphaned",
            removed.record.map(|record| record.id)
        );
        true
    }

    // =========================================================================
    // Counts
    // =========================================================================

    /// Population of a spawn point.
    #[must_use]
    pub fn count(&self, location: &SpawnerLocation) -> u32 {
        self.spawners.read().count(location)
    }

    /// Overwrites the population of a spawn point.
    pub fn set_count(&self, location: &SpawnerLocation, count: u32) {
        self.spawners.write().set_count(location, count);
    }

    // =========================================================================
    // Task handles
    // =========================================================================

    /// Records the spawn loop handle of a location.
    pub fn set_spawn_task(&self, location: &SpawnerLocation, handle: TaskHandle) {
        self.spawners.write().set_spawn_task(location, handle);
    }

    /// Spawn loop handle of a location.
    #[must_use]
    pub fn spawn_task(&self, location: &SpawnerLocation) -> Option<TaskHandle> {
        self.spawners.read().spawn_task(location)
    }

    /// Leash loop handle of a location.
    #[must_use]
    pub fn leash_task(&self, location: &SpawnerLocation) -> Option<TaskHandle> {
        self.spawners.read().leash_task(location)
    }

    /// Forgets the spawn loop handle if it is still `handle`.
    pub fn clear_spawn_task(&self, location: &SpawnerLocation, handle: TaskHandle) {
        let mut spawners = self.spawners.write();
        if spawners.spawn_task(location) == Some(handle) {
            spawners.take_spawn_task(location);
        }
    }

    /// Forgets the leash loop handle if it is still `handle`.
    pub fn clear_leash_task(&self, location: &SpawnerLocation, handle: TaskHandle) {
        let mut spawners = self.spawners.write();
        if spawners.leash_task(location) == Some(handle) {
            spawners.take_leash_task(location);
        }
    }

    /// Starts a leash loop unless a running one is recorded for the location.
    ///
    /// `is_running` and `start` run under the spawner lock and must not
    /// touch the registry. Returns true if a loop was started.
    pub fn ensure_leash_task<R, F>(&self, location: &SpawnerLocation, is_running: R, start: F) -> bool
    where
        R: Fn(TaskHandle) -> bool,
        F: FnOnce() -> Option<TaskHandle>,
    {
        let mut spawners = self.spawners.write();
        if !spawners.contains(location) {
            return false;
        }
        if spawners.leash_task(location).is_some_and(&is_running) {
            return false;
        }
        let Some(handle) = start() else {
            return false;
        };
        spawners.set_leash_task(location, handle);
        true
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Starts tracking an entity.
    ///
    /// An attributed entity increments its spawn point's count and joins its
    /// leash set when the spawner has the leash flag.
    pub fn track_entity(&self, id: EntityId, record: EntityRecord) -> Tracked {
        let mut spawners = self.spawners.write();
        let mut entities = self.entities.write();

        let Some(origin) = record.origin().cloned() else {
            entities.insert(id, record);
            return Tracked::Unattributed;
        };

        let Some(has_leash) = spawners.get(&origin).map(|spawner| spawner.has_leash) else {
            entities.insert(id, record.orphaned());
            return Tracked::Orphaned;
        };

        // Re-tracking the same id must not count it twice.
        if let Some(previous) = entities.insert(id, record) {
            if let Some(previous_origin) = previous.origin() {
                spawners.decrement(previous_origin);
                spawners.remove_leashed(previous_origin, id);
            }
        }
        spawners.increment(&origin);
        if has_leash {
            spawners.add_leashed(&origin, id);
            Tracked::Leashed
        } else {
            Tracked::Counted
        }
    }

    /// Looks up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<EntityRecord> {
        self.entities.read().get(id).cloned()
    }

    /// Stops tracking an entity, releasing its count and leash membership.
    pub fn untrack_entity(&self, id: EntityId) -> Option<EntityRecord> {
        let mut spawners = self.spawners.write();
        let mut entities = self.entities.write();

        let record = entities.remove(id)?;
        if let Some(origin) = record.origin() {
            spawners.remove_leashed(origin, id);
            if spawners.contains(origin) {
                spawners.decrement(origin);
            }
        }
        Some(record)
    }

    /// Every tracked entity, ordered by id.
    #[must_use]
    pub fn entities(&self) -> Vec<(EntityId, EntityRecord)> {
        let mut all: Vec<(EntityId, EntityRecord)> = self
            .entities
            .read()
            .iter()
            .map(|(id, record)| (id, record.clone()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.read().len()
    }

    /// Entities attributed to a spawn point.
    #[must_use]
    pub fn spawned_by(&self, origin: &SpawnerLocation) -> Vec<EntityId> {
        self.entities.read().spawned_by(origin)
    }

    // =========================================================================
    // Leash sets
    // =========================================================================

    /// Adds a tracked entity to a leash set.
    ///
    /// Returns false if the entity is not tracked or was already a member.
    pub fn add_leashed(&self, location: &SpawnerLocation, id: EntityId) -> bool {
        let mut spawners = self.spawners.write();
        let entities = self.entities.read();
        if !entities.contains(id) {
            return false;
        }
        spawners.add_leashed(location, id)
    }

    /// Removes an entity from a leash set.
    pub fn remove_leashed(&self, location: &SpawnerLocation, id: EntityId) -> bool {
        self.spawners.write().remove_leashed(location, id)
    }

    /// Members of a leash set.
    #[must_use]
    pub fn leashed(&self, location: &SpawnerLocation) -> Vec<EntityId> {
        self.spawners.read().leashed(location)
    }
}
