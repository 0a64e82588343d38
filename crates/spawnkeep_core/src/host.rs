//! # Host World Seam
//!
//! The narrow capability the registry consumes from the host simulation.
//! Entity physics, AI and chunk management live on the other side of this
//! trait.

use spawnkeep_shared::{ChunkPos, EntityId, Location, WorldId};

/// Capabilities the host world provides.
///
/// Every call is made from the main (tick) context.
pub trait HostWorld: Send + Sync {
    /// Creates an entity of `type_name` at `at`. Returns its identity, or
    /// `None` if the host refused.
    fn create_entity(&self, type_name: &str, at: &Location) -> Option<EntityId>;

    /// Returns true if the identity resolves to a live entity.
    fn entity_exists(&self, id: EntityId) -> bool;

    /// Returns the entity's current position, `None` if it no longer resolves.
    fn entity_position(&self, id: EntityId) -> Option<Location>;

    /// Moves an entity. Returns false if the host refused or the entity is gone.
    fn relocate(&self, id: EntityId, to: &Location) -> bool;

    /// Positions of every online player.
    fn online_player_positions(&self) -> Vec<Location>;

    /// Returns true if the block at `at` and the block above it are free.
    fn is_footprint_clear(&self, at: &Location) -> bool;

    /// Makes sure the chunk is loaded so its entities can be resolved.
    fn force_load_chunk(&self, world: &WorldId, chunk: ChunkPos);

    /// Returns true while the world is loaded.
    fn is_world_loaded(&self, world: &WorldId) -> bool;
}
