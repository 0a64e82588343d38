//! Spawn point records, population counts, leash sets and task handles.

use std::collections::{HashMap, HashSet};

use spawnkeep_shared::{EntityId, SpawnerId, SpawnerLocation};

use crate::scheduler::TaskHandle;

/// A registered spawn point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnerRecord {
    /// Opaque identifier, stable across restarts.
    pub id: SpawnerId,
    /// Spawner type name.
    pub type_name: String,
    /// Identity of the spawn point.
    pub location: SpawnerLocation,
    /// Whether spawned entities are tethered.
    pub has_leash: bool,
}

/// What [`SpawnerIndex::remove`] took out of the index.
#[derive(Debug, Default)]
pub struct RemovedSpawner {
    /// The record.
    pub record: Option<SpawnerRecord>,
    /// Spawn loop handle.
    pub spawn_task: Option<TaskHandle>,
    /// Leash loop handle.
    pub leash_task: Option<TaskHandle>,
}

/// Location-keyed registry of spawn points.
///
/// Records, counts, leash sets and task handles are separate maps with their
/// own lifetimes; they are conventionally created and removed together.
#[derive(Debug, Default)]
pub struct SpawnerIndex {
    records: HashMap<SpawnerLocation, SpawnerRecord>,
    by_id: HashMap<SpawnerId, SpawnerLocation>,
    counts: HashMap<SpawnerLocation, u32>,
    leashed: HashMap<SpawnerLocation, HashSet<EntityId>>,
    spawn_tasks: HashMap<SpawnerLocation, TaskHandle>,
    leash_tasks: HashMap<SpawnerLocation, TaskHandle>,
}

impl SpawnerIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record.
    ///
    /// Whatever was registered at its location is removed first, and so is
    /// the id's previous location if the id moves. Everything removed is
    /// returned; task handles are not cancelled.
    pub fn insert(&mut self, record: SpawnerRecord) -> Vec<RemovedSpawner> {
        let mut displaced = Vec::new();
        if self.records.contains_key(&record.location) {
            displaced.push(self.remove(&record.location));
        }
        if let Some(previous) = self.by_id.get(&record.id).cloned() {
            displaced.push(self.remove(&previous));
        }
        self.by_id.insert(record.id, record.location.clone());
        self.records.insert(record.location.clone(), record);
        displaced
    }

    /// Looks up a spawner by location.
    #[must_use]
    pub fn get(&self, location: &SpawnerLocation) -> Option<&SpawnerRecord> {
        self.records.get(location)
    }

    /// Returns true if a spawner is registered at the location.
    #[must_use]
    pub fn contains(&self, location: &SpawnerLocation) -> bool {
        self.records.contains_key(location)
    }

    /// Looks up the location of a spawner by id.
    #[must_use]
    pub fn location_of(&self, id: SpawnerId) -> Option<&SpawnerLocation> {
        self.by_id.get(&id)
    }

    /// Removes everything held for a location.
    ///
    /// Task handles are returned, not cancelled; the caller cancels them.
    pub fn remove(&mut self, location: &SpawnerLocation) -> RemovedSpawner {
        let record = self.records.remove(location);
        if let Some(record) = &record {
            self.by_id.remove(&record.id);
        }
        self.counts.remove(location);
        self.leashed.remove(location);
        RemovedSpawner {
            record,
            spawn_task: self.spawn_tasks.remove(location),
            leash_task: self.leash_tasks.remove(location),
        }
    }

    /// Number of registered spawners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no spawner is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over every record.
    pub fn records(&self) -> impl Iterator<Item = &SpawnerRecord> {
        self.records.values()
    }

    // =========================================================================
    // Population counts
    // =========================================================================

    /// Current population of a spawn point (0 if none is tracked).
    #[must_use]
    pub fn count(&self, location: &SpawnerLocation) -> u32 {
        self.counts.get(location).copied().unwrap_or(0)
    }

    /// Overwrites the population of a spawn point.
    pub fn set_count(&mut self, location: &SpawnerLocation, count: u32) {
        self.counts.insert(location.clone(), count);
    }

    /// Increments the population, creating it at 1 if missing.
    pub fn increment(&mut self, location: &SpawnerLocation) -> u32 {
        let count = self.counts.entry(location.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Decrements the population, saturating at zero.
    pub fn decrement(&mut self, location: &SpawnerLocation) -> u32 {
        match self.counts.get_mut(location) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        }
    }

    // =========================================================================
    // Leash sets
    // =========================================================================

    /// Adds an entity to a leash set. Returns false if it was already there.
    pub fn add_leashed(&mut self, location: &SpawnerLocation, id: EntityId) -> bool {
        self.leashed.entry(location.clone()).or_default().insert(id)
    }

    /// Removes an entity from a leash set.
    pub fn remove_leashed(&mut self, location: &SpawnerLocation, id: EntityId) -> bool {
        self.leashed
            .get_mut(location)
            .is_some_and(|set| set.remove(&id))
    }

    /// Members of a leash set, in a stable order.
    #[must_use]
    pub fn leashed(&self, location: &SpawnerLocation) -> Vec<EntityId> {
        let mut members: Vec<EntityId> = self
            .leashed
            .get(location)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    // =========================================================================
    // Task handles
    // =========================================================================

    /// Records the spawn loop handle. Returns the previous one.
    pub fn set_spawn_task(
        &mut self,
        location: &SpawnerLocation,
        handle: TaskHandle,
    ) -> Option<TaskHandle> {
        self.spawn_tasks.insert(location.clone(), handle)
    }

    /// Spawn loop handle of a location.
    #[must_use]
    pub fn spawn_task(&self, location: &SpawnerLocation) -> Option<TaskHandle> {
        self.spawn_tasks.get(location).copied()
    }

    /// Forgets the spawn loop handle.
    pub fn take_spawn_task(&mut self, location: &SpawnerLocation) -> Option<TaskHandle> {
        self.spawn_tasks.remove(location)
    }

    /// Records the leash loop handle. Returns the previous one.
    pub fn set_leash_task(
        &mut self,
        location: &SpawnerLocation,
        handle: TaskHandle,
    ) -> Option<TaskHandle> {
        self.leash_tasks.insert(location.clone(), handle)
    }

    /// Leash loop handle of a location.
    #[must_use]
    pub fn leash_task(&self, location: &SpawnerLocation) -> Option<TaskHandle> {
        self.leash_tasks.get(location).copied()
    }

    /// Forgets the leash loop handle.
    pub fn take_leash_task(&mut self, location: &SpawnerLocation) -> Option<TaskHandle> {
        self.leash_tasks.remove(location)
    }
}
