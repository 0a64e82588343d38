//! # Spawner Service
//!
//! Administrative surface used by the command layer and the persistence
//! gateway. Owns the injected indices, host, scheduler and strategies, and
//! starts or cancels the per-spawn-point loops.

use std::sync::Arc;

use parking_lot::RwLock;
use spawnkeep_shared::{EntityId, Location, SpawnReason, SpawnerId, SpawnerLocation, SpawnerTypeConfig};
use tracing::{debug, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::host::HostWorld;
use crate::index::{EntityRecord, Registry, SpawnerRecord, Tracked};
use crate::scheduler::TaskScheduler;
use crate::strategy::StrategyRegistry;
use crate::tasks::{LeashSettings, TaskContext};
use crate::types::TypeConfigStore;

/// Notified of administrative spawner changes.
///
/// Loads from storage do not notify.
pub trait SpawnerObserver: Send + Sync {
    /// A spawner was registered.
    fn spawner_registered(&self, record: &SpawnerRecord);
    /// A spawner was deleted or overwritten.
    fn spawner_deleted(&self, record: &SpawnerRecord);
}

/// Runtime parameters of the loops.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ServiceSettings {
    /// Leash loop parameters.
    pub leash: LeashSettings,
    /// Placement seed; `None` draws from entropy.
    pub seed: Option<u64>,
}

/// Administrative operations on spawners and entities.
pub struct SpawnerService {
    types: Arc<TypeConfigStore>,
    scheduler: Arc<dyn TaskScheduler>,
    ctx: Arc<TaskContext>,
    observers: RwLock<Vec<Arc<dyn SpawnerObserver>>>,
}

impl SpawnerService {
    /// Wires a service over explicitly constructed parts.
    #[must_use]
    pub fn new(
        types: Arc<TypeConfigStore>,
        registry: Arc<Registry>,
        strategies: Arc<StrategyRegistry>,
        host: Arc<dyn HostWorld>,
        scheduler: Arc<dyn TaskScheduler>,
        settings: ServiceSettings,
    ) -> Self {
        let ctx = Arc::new(TaskContext {
            registry,
            strategies,
            host,
            scheduler: Arc::downgrade(&scheduler),
            leash: settings.leash,
            seed: settings.seed,
        });
        Self {
            types,
            scheduler,
            ctx,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Spawner types.
    #[must_use]
    pub fn types(&self) -> &Arc<TypeConfigStore> {
        &self.types
    }

    /// Both indices.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.ctx.registry
    }

    /// Host world.
    #[must_use]
    pub fn host(&self) -> &Arc<dyn HostWorld> {
        &self.ctx.host
    }

    /// Per-type strategies.
    #[must_use]
    pub fn strategies(&self) -> &Arc<StrategyRegistry> {
        &self.ctx.strategies
    }

    /// Host scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Arc<dyn TaskScheduler> {
        &self.scheduler
    }

    /// Loop context shared by every task.
    #[must_use]
    pub fn task_context(&self) -> &Arc<TaskContext> {
        &self.ctx
    }

    /// Adds an observer of administrative changes.
    pub fn add_observer(&self, observer: Arc<dyn SpawnerObserver>) {
        self.observers.write().push(observer);
    }

    // =========================================================================
    // Spawners
    // =========================================================================

    /// Registers a spawner at `at`, overwriting any spawner already there.
    ///
    /// `has_leash = None` takes the type's default.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ConfigurationMissing`] if the type is unknown.
    pub fn register_spawner(
        &self,
        type_name: &str,
        at: &Location,
        has_leash: Option<bool>,
    ) -> RegistryResult<SpawnerId> {
        let config = self.types.require(type_name)?;
        let record = SpawnerRecord {
            id: SpawnerId::random(),
            type_name: type_name.to_string(),
            location: SpawnerLocation::normalize(at),
            has_leash: has_leash.unwrap_or(config.has_leash_default),
        };

        let replaced = self.install(record.clone(), config);
        let observers = self.observers.read();
        for observer in observers.iter() {
            for old in &replaced {
                observer.spawner_deleted(old);
            }
            observer.spawner_registered(&record);
        }

        info!("Registered {type_name} spawner {} at {}", record.id, record.location);
        Ok(record.id)
    }

    /// Registers a spawner read from storage and starts its loops.
    ///
    /// The population starts at zero. Observers are not notified.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ConfigurationMissing`] if the type is unknown.
    pub fn register_loaded(&self, record: SpawnerRecord) -> RegistryResult<()> {
        let config = self.types.require(&record.type_name)?;
        let location = record.location.clone();
        self.install(record, config);
        self.ctx.registry.set_count(&location, 0);
        Ok(())
    }

    /// Inserts a record, cancels whatever ran at its location and starts the
    /// new loops. Returns the displaced records.
    ///
    /// An overwrite behaves like a delete followed by a register: entities
    /// of the displaced spawner become `Unknown` and the count restarts.
    fn install(&self, record: SpawnerRecord, config: Arc<SpawnerTypeConfig>) -> Vec<SpawnerRecord> {
        let displaced = self.ctx.registry.insert_spawner(record.clone());
        let mut replaced = Vec::with_capacity(displaced.len());
        for removed in displaced {
            for handle in [removed.spawn_task, removed.leash_task].into_iter().flatten() {
                self.scheduler.cancel(handle);
            }
            if let Some(old) = removed.record {
                warn!("Overwriting spawner {} at {}", old.id, old.location);
                replaced.push(old);
            }
        }

        if self.ctx.start_spawn_task(&record, config).is_none() {
            warn!("Scheduler gone, spawner at {} will not spawn", record.location);
        }
        if record.has_leash {
            self.ctx.ensure_leash_task(&record.location);
        }
        replaced
    }

    /// Deletes the spawner at a location, cancelling its loops first.
    ///
    /// Returns false without changing anything if none is registered there.
    pub fn delete_spawner(&self, location: &SpawnerLocation) -> bool {
        let registry = &self.ctx.registry;
        let Some(record) = registry.spawner(location) else {
            debug!("No spawner to delete at {location}");
            return false;
        };
        if !registry.delete_spawner(location, self.scheduler.as_ref()) {
            return false;
        }

        for observer in self.observers.read().iter() {
            observer.spawner_deleted(&record);
        }
        info!("Deleted spawner {} at {location}", record.id);
        true
    }

    /// Every spawner, ordered by location.
    #[must_use]
    pub fn list_spawners(&self) -> Vec<SpawnerRecord> {
        self.ctx.registry.spawners()
    }

    /// Starts the leash loop of a spawner unless it is already running.
    pub fn ensure_leash_task(&self, location: &SpawnerLocation) -> bool {
        self.ctx.ensure_leash_task(location)
    }

    /// Cancels every loop without touching the records.
    ///
    /// Used before the shutdown snapshot so nothing spawns mid-save.
    pub fn stop_all(&self) -> usize {
        let registry = &self.ctx.registry;
        let mut cancelled = 0;
        for record in registry.spawners() {
            let location = &record.location;
            if let Some(handle) = registry.spawn_task(location) {
                cancelled += usize::from(self.scheduler.cancel(handle));
                registry.clear_spawn_task(location, handle);
            }
            if let Some(handle) = registry.leash_task(location) {
                cancelled += usize::from(self.scheduler.cancel(handle));
                registry.clear_leash_task(location, handle);
            }
        }
        debug!("Cancelled {cancelled} spawner loops");
        cancelled
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity outside any spawn point.
    ///
    /// `SpawnReason::Spawner` has no origin to reference and is recorded as
    /// `Unknown`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ConfigurationMissing`] if the type is unknown,
    /// [`RegistryError::HostRejected`] if creation or setup failed.
    pub fn summon(&self, type_name: &str, at: &Location, reason: SpawnReason) -> RegistryResult<EntityId> {
        self.types.require(type_name)?;
        if reason == SpawnReason::Spawner {
            warn!("Summoned {type_name} has no spawner, recording it as UNKNOWN");
        }

        let host = self.ctx.host.as_ref();
        let strategy = self.ctx.strategies.get(type_name);
        let id = strategy
            .create(host, type_name, at)
            .ok_or_else(|| RegistryError::HostRejected(type_name.to_string()))?;
        if !strategy.setup(host, id) {
            return Err(RegistryError::HostRejected(type_name.to_string()));
        }

        let record = EntityRecord::unattributed(type_name, reason);
        let reason = record.reason();
        self.ctx.registry.track_entity(id, record);
        info!("Summoned {type_name} {id} ({reason})");
        Ok(id)
    }

    /// Tracks an entity read from storage, joining its leash set if any.
    pub fn track_loaded(&self, id: EntityId, record: EntityRecord) -> Tracked {
        let origin = record.origin().cloned();
        let tracked = self.ctx.registry.track_entity(id, record);
        if let (Tracked::Leashed, Some(origin)) = (tracked, origin) {
            self.ctx.ensure_leash_task(&origin);
        }
        tracked
    }

    /// Host notification that an entity died or despawned.
    ///
    /// Returns false for untracked ids.
    pub fn entity_removed(&self, id: EntityId) -> bool {
        match self.ctx.registry.untrack_entity(id) {
            Some(record) => {
                debug!("Entity {id} ({}) removed", record.type_name());
                true
            }
            None => false,
        }
    }
}
