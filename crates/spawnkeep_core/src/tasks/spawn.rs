//! Spawn loop of one spawn point.
//!
//! ```text
//! invocation ─┬─ timer < warmup ──> timer += cooldown, return
//!             └─ timer = 0 ──> gate ──> up to mobs_per_attempt placements
//!                                           (stop at the population cap)
//! ```
//!
//! The timer starts at the warmup value, so the first invocation attempts a
//! spawn. After that an attempt needs `ceil(warmup / cooldown)` skipped
//! invocations.

use std::sync::Arc;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use spawnkeep_shared::{SpawnerId, SpawnerLocation, SpawnerTypeConfig, Vec3};
use tracing::{debug, error, info, warn};

use super::TaskContext;
use crate::index::{EntityRecord, SpawnerRecord, Tracked};
use crate::scheduler::{RepeatingTask, TaskControl};

/// What one invocation did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// Still below the warmup threshold.
    WarmingUp,
    /// Warm, but no player was close enough.
    Gated,
    /// Placements were tried.
    Attempted {
        /// Entities created and tracked.
        spawned: u32,
    },
    /// The world is gone or the spawner was removed; the loop stops.
    Stopped,
}

/// Periodic spawn process of one spawn point.
pub struct SpawnTask {
    ctx: Arc<TaskContext>,
    spawner_id: SpawnerId,
    location: SpawnerLocation,
    type_name: String,
    config: Arc<SpawnerTypeConfig>,
    timer: u32,
    rng: ChaCha8Rng,
}

impl SpawnTask {
    /// Creates the loop for a spawner, ready to attempt on its first run.
    #[must_use]
    pub fn new(ctx: Arc<TaskContext>, record: &SpawnerRecord, config: Arc<SpawnerTypeConfig>) -> Self {
        let rng = ctx.rng_for(&record.location);
        Self {
            timer: config.warmup,
            ctx,
            spawner_id: record.id,
            location: record.location.clone(),
            type_name: record.type_name.clone(),
            config,
            rng,
        }
    }

    /// Runs one invocation.
    pub fn step(&mut self) -> SpawnOutcome {
        if !self.ctx.host.is_world_loaded(self.location.world()) {
            warn!("World {} is not loaded, stopping spawn loop for {}", self.location.world(), self.location);
            return SpawnOutcome::Stopped;
        }
        match self.ctx.registry.spawner(&self.location) {
            Some(record) if record.id == self.spawner_id => {}
            _ => {
                debug!("Spawner at {} is gone, stopping its spawn loop", self.location);
                return SpawnOutcome::Stopped;
            }
        }

        if self.timer < self.config.warmup {
            self.timer = self.timer.saturating_add(self.config.cooldown);
            return SpawnOutcome::WarmingUp;
        }
        self.timer = 0;

        if !self.gate_open() {
            return SpawnOutcome::Gated;
        }

        let mut spawned = 0;
        for _ in 0..self.config.mobs_per_attempt {
            if self.ctx.registry.count(&self.location) >= self.config.max_mobs {
                break;
            }
            if self.place() {
                spawned += 1;
            }
        }
        SpawnOutcome::Attempted { spawned }
    }

    /// True if no player is required or one is within activation range.
    fn gate_open(&self) -> bool {
        if !self.config.check_for_players {
            return true;
        }
        let center = self.location.to_location();
        self.ctx
            .host
            .online_player_positions()
            .iter()
            .filter_map(|player| player.distance(&center))
            .any(|distance| distance < self.config.activation_range)
    }

    /// Offset in `[-radius, radius]` with an independently random sign.
    fn offset(&mut self, radius: f64) -> f64 {
        let magnitude = self.rng.gen::<f64>() * radius;
        if self.rng.gen::<bool>() {
            -magnitude
        } else {
            magnitude
        }
    }

    /// One placement. Returns true if an entity was created and tracked.
    fn place(&mut self) -> bool {
        let offset = Vec3::new(
            self.offset(self.config.radius_x),
            self.offset(self.config.radius_y),
            self.offset(self.config.radius_x),
        );
        let target = self.location.to_location().offset(offset);

        let host = self.ctx.host.as_ref();
        if !host.is_footprint_clear(&target) {
            return false;
        }

        let strategy = self.ctx.strategies.get(&self.type_name);
        let Some(id) = strategy.create(host, &self.type_name, &target) else {
            debug!("Host refused to create {} at {}", self.type_name, self.location);
            return false;
        };
        if !strategy.setup(host, id) {
            error!(
                "Setup of {} {id} at {} failed; it stays in the world untracked",
                self.type_name, self.location
            );
            return false;
        }

        let record = EntityRecord::from_spawner(self.type_name.clone(), self.location.clone());
        match self.ctx.registry.track_entity(id, record) {
            Tracked::Leashed => {
                self.ctx.ensure_leash_task(&self.location);
            }
            Tracked::Orphaned => {
                warn!("Spawner at {} vanished while spawning {id}", self.location);
            }
            Tracked::Counted | Tracked::Unattributed => {}
        }
        info!("Spawned {} {id} at {}", self.type_name, self.location);
        true
    }
}

impl RepeatingTask for SpawnTask {
    fn run(&mut self) -> TaskControl {
        match self.step() {
            SpawnOutcome::Stopped => TaskControl::Cancel,
            _ => TaskControl::Continue,
        }
    }
}
