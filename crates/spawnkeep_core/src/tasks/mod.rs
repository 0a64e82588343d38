//! # Per-Spawn-Point Loops
//!
//! Every spawn point runs a [`SpawnTask`] on a period equal to its type's
//! cooldown. Leashing spawn points also run a [`LeashTask`]. Both are
//! [`RepeatingTask`]s handed to the host scheduler, and both share one
//! [`TaskContext`].
//!
//! The context holds the scheduler weakly: the scheduler owns the tasks,
//! so a strong reference back would keep everything alive forever.

mod leash;
mod spawn;

pub use leash::{LeashOutcome, LeashSettings, LeashTask};
pub use spawn::{SpawnOutcome, SpawnTask};

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use spawnkeep_shared::{SpawnerLocation, SpawnerTypeConfig};
use tracing::{debug, warn};

use crate::host::HostWorld;
use crate::index::{Registry, SpawnerRecord};
use crate::scheduler::{RepeatingTask, TaskHandle, TaskScheduler};
use crate::strategy::StrategyRegistry;

/// Shared state of every spawn and leash loop.
pub struct TaskContext {
    /// Both indices.
    pub registry: Arc<Registry>,
    /// Per-type creation logic.
    pub strategies: Arc<StrategyRegistry>,
    /// Host world.
    pub host: Arc<dyn HostWorld>,
    /// Host scheduler, held weakly.
    pub scheduler: Weak<dyn TaskScheduler>,
    /// Leash loop parameters.
    pub leash: LeashSettings,
    /// Base seed for placement randomness; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl TaskContext {
    /// Schedules the spawn loop of a spawner and records its handle.
    ///
    /// Returns `None` if the scheduler is gone.
    pub fn start_spawn_task(
        self: &Arc<Self>,
        record: &SpawnerRecord,
        config: Arc<SpawnerTypeConfig>,
    ) -> Option<TaskHandle> {
        let scheduler = self.scheduler.upgrade()?;
        let period = u64::from(config.cooldown);
        let task = SpawnTask::new(Arc::clone(self), record, config);
        let handle = scheduler.schedule_repeating(
            &format!("spawn {}", record.location),
            period,
            Box::new(task),
        );
        self.registry.set_spawn_task(&record.location, handle);
        debug!("Started spawn loop for {} every {period} ticks", record.location);
        Some(handle)
    }

    /// Starts the leash loop of a spawner unless it is already running.
    ///
    /// Returns true if a loop was started.
    pub fn ensure_leash_task(self: &Arc<Self>, location: &SpawnerLocation) -> bool {
        let Some(scheduler) = self.scheduler.upgrade() else {
            warn!("Scheduler gone, cannot start leash loop for {location}");
            return false;
        };
        let started = self.registry.ensure_leash_task(
            location,
            |handle| scheduler.is_scheduled(handle),
            || {
                let task = LeashTask::new(Arc::clone(self), location.clone());
                Some(scheduler.schedule_repeating(
                    &format!("leash {location}"),
                    self.leash.period_ticks,
                    Box::new(task) as Box<dyn RepeatingTask>,
                ))
            },
        );
        if started {
            debug!("Started leash loop for {location}");
        }
        started
    }

    /// Placement randomness for one spawn point.
    fn rng_for(&self, location: &SpawnerLocation) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => {
                let mut hasher = DefaultHasher::new();
                location.hash(&mut hasher);
                ChaCha8Rng::seed_from_u64(seed ^ hasher.finish())
            }
            None => ChaCha8Rng::from_entropy(),
        }
    }
}
