//! Leash loop of one spawn point.
//!
//! Entities that stray past the tether are pulled back to the spawner.
//! Entities the host no longer resolves are pruned from the leash set and
//! the entity index, and release their population slot.

use std::sync::Arc;

use spawnkeep_shared::{SpawnerLocation, DEFAULT_LEASH_DISTANCE, DEFAULT_LEASH_PERIOD_TICKS};
use tracing::{debug, info, warn};

use super::TaskContext;
use crate::scheduler::{RepeatingTask, TaskControl};

/// Leash loop parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeashSettings {
    /// Tether length (blocks).
    pub max_distance: f64,
    /// Loop period (ticks).
    pub period_ticks: u64,
}

impl Default for LeashSettings {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_LEASH_DISTANCE,
            period_ticks: DEFAULT_LEASH_PERIOD_TICKS,
        }
    }
}

/// What one pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeashOutcome {
    /// Entities moved back.
    pub relocated: u32,
    /// Entities dropped because they no longer resolve.
    pub pruned: u32,
    /// The spawner is gone; the loop stops.
    pub stopped: bool,
}

/// Periodic tether process of one spawn point.
pub struct LeashTask {
    ctx: Arc<TaskContext>,
    location: SpawnerLocation,
}

impl LeashTask {
    /// Creates the loop for a spawn point.
    #[must_use]
    pub fn new(ctx: Arc<TaskContext>, location: SpawnerLocation) -> Self {
        Self { ctx, location }
    }

    /// Runs one pass over the leash set.
    pub fn step(&mut self) -> LeashOutcome {
        let mut outcome = LeashOutcome::default();
        if self.ctx.registry.spawner(&self.location).is_none() {
            debug!("Spawner at {} is gone, stopping its leash loop", self.location);
            outcome.stopped = true;
            return outcome;
        }

        let center = self.location.to_location();
        let anchor = self.location.anchor();
        let host = self.ctx.host.as_ref();

        for id in self.ctx.registry.leashed(&self.location) {
            let Some(position) = host.entity_position(id) else {
                self.ctx.registry.untrack_entity(id);
                info!("Pruned vanished entity {id} from {}", self.location);
                outcome.pruned += 1;
                continue;
            };

            // Other world counts as out of range.
            let strayed = position
                .distance(&center)
                .map_or(true, |distance| distance > self.ctx.leash.max_distance);
            if !strayed {
                continue;
            }

            if host.relocate(id, &anchor) {
                debug!("Pulled {id} back to {}", self.location);
                outcome.relocated += 1;
            } else {
                warn!("Host refused to relocate {id} to {}", self.location);
            }
        }
        outcome
    }
}

impl RepeatingTask for LeashTask {
    fn run(&mut self) -> TaskControl {
        if self.step().stopped {
            TaskControl::Cancel
        } else {
            TaskControl::Continue
        }
    }
}
