//! # Durable Schema
//!
//! ```text
//! Spawners(id UNIQUE, type, world, x, y, z, hasLeash)
//! Entities(identity UNIQUE, type, world, chunkX, chunkZ, spawnReason, spawnerId NULLABLE)
//! ```
//!
//! Both tables are fully replaced on every shutdown save. Inserting a key
//! that already exists replaces the row.

use std::collections::BTreeMap;
use std::fmt;

use spawnkeep_core::SpawnerRecord;
use spawnkeep_shared::{BlockPos, ChunkPos, EntityId, SpawnReason, SpawnerId, SpawnerLocation, WorldId};

/// Backing table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    /// Spawn points.
    Spawners,
    /// Tracked entities.
    Entities,
}

impl Table {
    /// Both tables.
    pub const ALL: [Table; 2] = [Table::Spawners, Table::Entities];

    /// Table name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spawners => "Spawners",
            Self::Entities => "Entities",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of `Spawners`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnerRow {
    /// Spawner id.
    pub id: SpawnerId,
    /// Type name.
    pub type_name: String,
    /// World name.
    pub world: WorldId,
    /// Block X.
    pub x: i32,
    /// Block Y.
    pub y: i32,
    /// Block Z.
    pub z: i32,
    /// Leash flag.
    pub has_leash: bool,
}

impl SpawnerRow {
    /// Row for a registered spawner.
    #[must_use]
    pub fn from_record(record: &SpawnerRecord) -> Self {
        let block = record.location.block();
        Self {
            id: record.id,
            type_name: record.type_name.clone(),
            world: record.location.world().clone(),
            x: block.x,
            y: block.y,
            z: block.z,
            has_leash: record.has_leash,
        }
    }

    /// Normalized location of the row.
    #[must_use]
    pub fn location(&self) -> SpawnerLocation {
        SpawnerLocation::new(self.world.clone(), BlockPos::new(self.x, self.y, self.z))
    }

    /// Spawner record described by the row.
    #[must_use]
    pub fn into_record(self) -> SpawnerRecord {
        SpawnerRecord {
            location: self.location(),
            id: self.id,
            type_name: self.type_name,
            has_leash: self.has_leash,
        }
    }
}

/// One row of `Entities`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityRow {
    /// Entity identity.
    pub id: EntityId,
    /// Type name.
    pub type_name: String,
    /// World the entity was in.
    pub world: WorldId,
    /// Chunk X at save time.
    pub chunk_x: i32,
    /// Chunk Z at save time.
    pub chunk_z: i32,
    /// Spawn reason.
    pub reason: SpawnReason,
    /// Originating spawner, set only for `SPAWNER`.
    pub spawner_id: Option<SpawnerId>,
}

impl EntityRow {
    /// Chunk the entity was saved in.
    #[must_use]
    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos::new(self.chunk_x, self.chunk_z)
    }
}

/// In-memory copy of both tables, used by the stores for committed state
/// and open transactions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Tables {
    pub spawners: BTreeMap<SpawnerId, SpawnerRow>,
    pub entities: BTreeMap<EntityId, EntityRow>,
}

impl Tables {
    pub fn truncate(&mut self, table: Table) {
        match table {
            Table::Spawners => self.spawners.clear(),
            Table::Entities => self.entities.clear(),
        }
    }

    pub fn insert_spawners(&mut self, rows: &[SpawnerRow]) {
        self.spawners
            .extend(rows.iter().map(|row| (row.id, row.clone())));
    }

    pub fn insert_entities(&mut self, rows: &[EntityRow]) {
        self.entities
            .extend(rows.iter().map(|row| (row.id, row.clone())));
    }

    pub fn delete_spawner(&mut self, id: SpawnerId) -> bool {
        self.spawners.remove(&id).is_some()
    }
}
