//! # Locations
//!
//! Host positions ([`Location`]) carry orientation and fractional
//! coordinates. Spawn points are identified by a [`SpawnerLocation`]: the
//! world plus the integer block the position falls in. It is normalized once
//! at construction and never changes afterwards, so it is safe to use as a
//! map key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::CHUNK_SHIFT;
use crate::math::Vec3;

/// Name of a host world.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorldId(String);

impl WorldId {
    /// Creates a world id from its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the world name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorldId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A position in a host world, as reported by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// World the position is in.
    pub world: WorldId,
    /// Coordinates (blocks, fractional).
    pub pos: Vec3,
    /// Horizontal facing (degrees).
    pub yaw: f32,
    /// Vertical facing (degrees).
    pub pitch: f32,
}

impl Location {
    /// Creates a location with zero orientation.
    #[must_use]
    pub fn new(world: impl Into<WorldId>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            pos: Vec3::new(x, y, z),
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Returns the block this location falls in.
    #[must_use]
    pub fn block(&self) -> BlockPos {
        BlockPos::containing(self.pos)
    }

    /// Returns the chunk this location falls in.
    #[must_use]
    pub fn chunk(&self) -> ChunkPos {
        self.block().chunk()
    }

    /// Returns a copy offset by `delta`, orientation unchanged.
    #[must_use]
    pub fn offset(&self, delta: Vec3) -> Self {
        Self {
            world: self.world.clone(),
            pos: self.pos + delta,
            yaw: self.yaw,
            pitch: self.pitch,
        }
    }

    /// Distance to another location, `None` if they are in different worlds.
    #[must_use]
    pub fn distance(&self, other: &Location) -> Option<f64> {
        (self.world == other.world).then(|| self.pos.distance(other.pos))
    }
}

impl From<WorldId> for Location {
    fn from(world: WorldId) -> Self {
        Self {
            world,
            pos: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
        }
    }
}

/// Integer block coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    /// Block X.
    pub x: i32,
    /// Block Y.
    pub y: i32,
    /// Block Z.
    pub z: i32,
}

impl BlockPos {
    /// Creates block coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the block containing a fractional position (floor on every axis).
    #[must_use]
    pub fn containing(pos: Vec3) -> Self {
        Self {
            x: pos.x.floor() as i32,
            y: pos.y.floor() as i32,
            z: pos.z.floor() as i32,
        }
    }

    /// Returns the block directly above.
    #[must_use]
    pub const fn above(self) -> Self {
        Self::new(self.x, self.y + 1, self.z)
    }

    /// Returns the chunk containing this block.
    #[must_use]
    pub const fn chunk(self) -> ChunkPos {
        ChunkPos {
            x: self.x >> CHUNK_SHIFT,
            z: self.z >> CHUNK_SHIFT,
        }
    }

    /// Returns the block's minimum corner as a position.
    #[must_use]
    pub fn corner(self) -> Vec3 {
        Vec3::new(f64::from(self.x), f64::from(self.y), f64::from(self.z))
    }
}

/// Chunk coordinates (16x16 columns).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    /// Chunk X.
    pub x: i32,
    /// Chunk Z.
    pub z: i32,
}

impl ChunkPos {
    /// Creates chunk coordinates.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Returns the first block (minimum x/z) of this chunk.
    #[must_use]
    pub const fn min_block_x(self) -> i32 {
        self.x << CHUNK_SHIFT
    }

    /// Returns the first block (minimum x/z) of this chunk.
    #[must_use]
    pub const fn min_block_z(self) -> i32 {
        self.z << CHUNK_SHIFT
    }
}

/// Identity of a spawn point: world plus block coordinates.
///
/// Orientation and fractional parts of the source location are discarded at
/// construction. Two registrations that normalize to the same value refer
/// to the same spawn point.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpawnerLocation {
    world: WorldId,
    block: BlockPos,
}

impl SpawnerLocation {
    /// Creates a spawner location from its parts.
    #[must_use]
    pub fn new(world: impl Into<WorldId>, block: BlockPos) -> Self {
        Self {
            world: world.into(),
            block,
        }
    }

    /// Normalizes a host location into a spawner key.
    #[must_use]
    pub fn normalize(location: &Location) -> Self {
        Self {
            world: location.world.clone(),
            block: location.block(),
        }
    }

    /// Returns the world.
    #[must_use]
    pub fn world(&self) -> &WorldId {
        &self.world
    }

    /// Returns the block coordinates.
    #[must_use]
    pub const fn block(&self) -> BlockPos {
        self.block
    }

    /// Returns the chunk the spawner sits in.
    #[must_use]
    pub const fn chunk(&self) -> ChunkPos {
        self.block.chunk()
    }

    /// Returns the block corner as a host location with zero orientation.
    #[must_use]
    pub fn to_location(&self) -> Location {
        Location {
            world: self.world.clone(),
            pos: self.block.corner(),
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Returns the horizontal centre of the block, one block up.
    ///
    /// Used as the relocation target for leashed entities.
    #[must_use]
    pub fn anchor(&self) -> Location {
        self.to_location().offset(Vec3::new(0.5, 1.0, 0.5))
    }
}

impl fmt::Display for SpawnerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@({}, {}, {})",
            self.world, self.block.x, self.block.y, self.block.z
        )
    }
}
