//! # SPAWNKEEP Shared
//!
//! Value types used by the registry, the schedulers and the storage layer.
//!
//! ## Key Rule
//!
//! Spawn points are keyed by [`SpawnerLocation`], an immutable value built
//! once from a host [`Location`]. Nothing in the workspace keys a map with a
//! mutable position.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod ids;
pub mod location;
pub mod math;
pub mod spawn;

pub use config::{SpawnerTypeConfig, SpawnerTypeEntry};
pub use constants::{
    CHUNK_SHIFT, DEFAULT_LEASH_DISTANCE, DEFAULT_LEASH_PERIOD_TICKS, INSERT_BATCH_SIZE,
    STATEMENT_TIMEOUT_SECS,
};
pub use ids::{EntityId, ParseIdError, SpawnerId};
pub use location::{BlockPos, ChunkPos, Location, SpawnerLocation, WorldId};
pub use math::Vec3;
pub use spawn::{ParseSpawnReasonError, SpawnReason};
