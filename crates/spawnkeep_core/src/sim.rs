//! # Simulated Host World
//!
//! In-memory [`HostWorld`] used by tests, benches and the headless server.
//! Holds entities, player positions, obstructed blocks and loaded worlds,
//! and counts the requests it receives.

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::Mutex;
use spawnkeep_shared::{BlockPos, ChunkPos, EntityId, Location, WorldId};
use tracing::trace;

use crate::host::HostWorld;

#[derive(Clone, Debug)]
struct SimEntity {
    type_name: String,
    location: Location,
}

#[derive(Debug, Default)]
struct SimState {
    worlds: HashSet<WorldId>,
    entities: HashMap<EntityId, SimEntity>,
    players: Vec<Location>,
    obstructed: HashSet<(WorldId, BlockPos)>,
    forced_chunks: BTreeSet<(WorldId, ChunkPos)>,
    creation_requests: u64,
    relocations: u64,
    refuse_creation: bool,
}

/// Simulated host world.
#[derive(Debug, Default)]
pub struct SimWorld {
    state: Mutex<SimState>,
}

impl SimWorld {
    /// Creates a host with no worlds loaded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a host with one loaded world.
    #[must_use]
    pub fn with_world(name: &str) -> Self {
        let sim = Self::new();
        sim.load_world(name);
        sim
    }

    /// Loads a world.
    pub fn load_world(&self, name: &str) {
        self.state.lock().worlds.insert(WorldId::new(name));
    }

    /// Unloads a world. Its entities stay but nothing can spawn there.
    pub fn unload_world(&self, name: &str) {
        self.state.lock().worlds.remove(&WorldId::new(name));
    }

    // =========================================================================
    // Players
    // =========================================================================

    /// Adds an online player. Returns its index.
    pub fn add_player(&self, at: Location) -> usize {
        let mut state = self.state.lock();
        state.players.push(at);
        state.players.len() - 1
    }

    /// Moves a player. Unknown indices are ignored.
    pub fn move_player(&self, index: usize, to: Location) {
        if let Some(player) = self.state.lock().players.get_mut(index) {
            *player = to;
        }
    }

    /// Disconnects every player.
    pub fn clear_players(&self) {
        self.state.lock().players.clear();
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Marks a block as solid.
    pub fn obstruct(&self, world: &str, block: BlockPos) {
        self.state.lock().obstructed.insert((WorldId::new(world), block));
    }

    /// Clears every solid block.
    pub fn clear_obstructions(&self) {
        self.state.lock().obstructed.clear();
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Places an entity directly, as if the world already held it.
    pub fn insert_entity(&self, type_name: &str, at: Location) -> EntityId {
        let id = EntityId::random();
        self.state.lock().entities.insert(
            id,
            SimEntity {
                type_name: type_name.to_string(),
                location: at,
            },
        );
        id
    }

    /// Removes an entity, as if it died. Returns false if it did not exist.
    pub fn despawn(&self, id: EntityId) -> bool {
        self.state.lock().entities.remove(&id).is_some()
    }

    /// Moves an entity, as if it wandered.
    pub fn move_entity(&self, id: EntityId, to: Location) -> bool {
        match self.state.lock().entities.get_mut(&id) {
            Some(entity) => {
                entity.location = to;
                true
            }
            None => false,
        }
    }

    /// Type of a live entity.
    #[must_use]
    pub fn entity_type(&self, id: EntityId) -> Option<String> {
        self.state
            .lock()
            .entities
            .get(&id)
            .map(|entity| entity.type_name.clone())
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.state.lock().entities.len()
    }

    /// Makes [`HostWorld::create_entity`] refuse every request.
    pub fn set_refuse_creation(&self, refuse: bool) {
        self.state.lock().refuse_creation = refuse;
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Number of creation requests received, refused ones included.
    #[must_use]
    pub fn creation_requests(&self) -> u64 {
        self.state.lock().creation_requests
    }

    /// Number of successful relocations.
    #[must_use]
    pub fn relocations(&self) -> u64 {
        self.state.lock().relocations
    }

    /// Chunks force-loaded so far.
    #[must_use]
    pub fn forced_chunks(&self) -> Vec<(WorldId, ChunkPos)> {
        self.state.lock().forced_chunks.iter().cloned().collect()
    }
}

impl HostWorld for SimWorld {
    fn create_entity(&self, type_name: &str, at: &Location) -> Option<EntityId> {
        let mut state = self.state.lock();
        state.creation_requests += 1;
        if state.refuse_creation || !state.worlds.contains(&at.world) {
            return None;
        }

        let id = EntityId::random();
        state.entities.insert(
            id,
            SimEntity {
                type_name: type_name.to_string(),
                location: at.clone(),
            },
        );
        trace!("Created {type_name} {id}");
        Some(id)
    }

    fn entity_exists(&self, id: EntityId) -> bool {
        self.state.lock().entities.contains_key(&id)
    }

    fn entity_position(&self, id: EntityId) -> Option<Location> {
        self.state
            .lock()
            .entities
            .get(&id)
            .map(|entity| entity.location.clone())
    }

    fn relocate(&self, id: EntityId, to: &Location) -> bool {
        let mut state = self.state.lock();
        let Some(entity) = state.entities.get_mut(&id) else {
            return false;
        };
        entity.location = to.clone();
        state.relocations += 1;
        true
    }

    fn online_player_positions(&self) -> Vec<Location> {
        self.state.lock().players.clone()
    }

    fn is_footprint_clear(&self, at: &Location) -> bool {
        let state = self.state.lock();
        let block = at.block();
        !state.obstructed.contains(&(at.world.clone(), block))
            && !state.obstructed.contains(&(at.world.clone(), block.above()))
    }

    fn force_load_chunk(&self, world: &WorldId, chunk: ChunkPos) {
        self.state.lock().forced_chunks.insert((world.clone(), chunk));
    }

    fn is_world_loaded(&self, world: &WorldId) -> bool {
        self.state.lock().worlds.contains(world)
    }
}
