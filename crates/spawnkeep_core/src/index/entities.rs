//! Identity-keyed registry of spawned entities and their provenance.

use std::collections::HashMap;

use spawnkeep_shared::{EntityId, SpawnReason, SpawnerLocation};

/// Provenance of a tracked entity.
///
/// `origin` is present exactly when `reason` is [`SpawnReason::Spawner`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityRecord {
    type_name: String,
    reason: SpawnReason,
    origin: Option<SpawnerLocation>,
}

impl EntityRecord {
    /// An entity produced by the spawn point at `origin`.
    #[must_use]
    pub fn from_spawner(type_name: impl Into<String>, origin: SpawnerLocation) -> Self {
        Self {
            type_name: type_name.into(),
            reason: SpawnReason::Spawner,
            origin: Some(origin),
        }
    }

    /// An entity with no spawn point. `Spawner` is recorded as `Unknown`.
    #[must_use]
    pub fn unattributed(type_name: impl Into<String>, reason: SpawnReason) -> Self {
        let reason = match reason {
            SpawnReason::Spawner => SpawnReason::Unknown,
            other => other,
        };
        Self {
            type_name: type_name.into(),
            reason,
            origin: None,
        }
    }

    /// Type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Spawn reason.
    #[must_use]
    pub const fn reason(&self) -> SpawnReason {
        self.reason
    }

    /// Originating spawn point.
    #[must_use]
    pub const fn origin(&self) -> Option<&SpawnerLocation> {
        self.origin.as_ref()
    }

    /// Drops the spawner reference and downgrades the reason to `Unknown`.
    #[must_use]
    pub fn orphaned(self) -> Self {
        Self::unattributed(self.type_name, SpawnReason::Unknown)
    }
}

/// Tracked entities.
#[derive(Debug, Default)]
pub struct EntityIndex {
    entities: HashMap<EntityId, EntityRecord>,
}

impl EntityIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record. Returns the replaced one.
    pub fn insert(&mut self, id: EntityId, record: EntityRecord) -> Option<EntityRecord> {
        self.entities.insert(id, record)
    }

    /// Looks up an entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    /// Returns true if the entity is tracked.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Removes an entity.
    pub fn remove(&mut self, id: EntityId) -> Option<EntityRecord> {
        self.entities.remove(&id)
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates over every entity.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &EntityRecord)> {
        self.entities.iter().map(|(id, record)| (*id, record))
    }

    /// Entities attributed to a spawn point, in a stable order.
    #[must_use]
    pub fn spawned_by(&self, origin: &SpawnerLocation) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .iter()
            .filter(|(_, record)| record.origin() == Some(origin))
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    /// Downgrades every entity attributed to `origin` to `Unknown`.
    ///
    /// Returns how many were rewritten.
    pub fn orphan_spawned_by(&mut self, origin: &SpawnerLocation) -> usize {
        let mut orphaned = 0;
        for record in self.entities.values_mut() {
            if record.origin() == Some(origin) {
                *record = record.clone().orphaned();
                orphaned += 1;
            }
        }
        orphaned
    }
}
