//! # Spawner Module
//!
//! Wires the registry, the spawn and leash loops and persistence together.
//!
//! ```text
//! enable:  register types → open store → start worker → ensure schema
//!          → load + reconcile → mirror admin changes to storage
//! disable: stop every loop → save snapshot → wait → drain worker
//! ```
//!
//! A module is enabled at most once. The service exists from construction
//! so custom spawn strategies can be registered before `enable`.

use std::sync::Arc;

use spawnkeep_core::{
    HostWorld, Registry, SpawnerService, StrategyRegistry, TaskScheduler, TypeConfigStore,
};
use spawnkeep_storage::{
    FileStore, IncrementalSync, LoadReport, MemoryStore, PersistenceGateway, PersistenceWorker,
    SaveReport, Storage,
};
use tracing::{error, info, warn};

use crate::config::{ServerConfig, StorageBackend};
use crate::module::{Module, ModuleError, ModuleResult};

/// Name the server registers this module under.
pub const SPAWNER_MODULE: &str = "spawners";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Fresh,
    Enabled,
    Disabled,
}

impl State {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "not yet enabled",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }
}

/// Spawner registry with persistence.
pub struct SpawnerModule {
    config: ServerConfig,
    service: Arc<SpawnerService>,
    storage: Option<Box<dyn Storage>>,
    gateway: Option<PersistenceGateway>,
    last_load: Option<LoadReport>,
    last_save: Option<SaveReport>,
    state: State,
}

impl SpawnerModule {
    /// Creates the module around a host world and a tick scheduler.
    #[must_use]
    pub fn new(config: ServerConfig, host: Arc<dyn HostWorld>, scheduler: Arc<dyn TaskScheduler>) -> Self {
        let service = Arc::new(SpawnerService::new(
            Arc::new(TypeConfigStore::new()),
            Arc::new(Registry::new()),
            Arc::new(StrategyRegistry::new()),
            host,
            scheduler,
            config.service_settings(),
        ));
        Self {
            config,
            service,
            storage: None,
            gateway: None,
            last_load: None,
            last_save: None,
            state: State::Fresh,
        }
    }

    /// Uses `storage` instead of the backend named in the configuration.
    #[must_use]
    pub fn with_storage(mut self, storage: Box<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// The administrative surface.
    #[must_use]
    pub fn service(&self) -> &Arc<SpawnerService> {
        &self.service
    }

    /// Persistence, while enabled.
    #[must_use]
    pub fn gateway(&self) -> Option<&PersistenceGateway> {
        self.gateway.as_ref()
    }

    /// Outcome of the startup load.
    #[must_use]
    pub fn last_load(&self) -> Option<&LoadReport> {
        self.last_load.as_ref()
    }

    /// Outcome of the shutdown save.
    #[must_use]
    pub fn last_save(&self) -> Option<&SaveReport> {
        self.last_save.as_ref()
    }

    fn register_types(&self) {
        let types = self.service.types();
        for entry in &self.config.spawner_types {
            if let Err(e) = types.register(&entry.name, entry.config.clone()) {
                warn!("Skipping spawner type {}: {e}", entry.name);
            }
        }
    }

    fn open_storage(&mut self) -> ModuleResult<Box<dyn Storage>> {
        if let Some(storage) = self.storage.take() {
            return Ok(storage);
        }
        let storage = &self.config.storage;
        Ok(match storage.backend {
            StorageBackend::Memory => {
                warn!("Using in-memory storage, spawners will not survive a restart");
                Box::new(MemoryStore::with_timeout(storage.statement_timeout()))
            }
            StorageBackend::File => {
                info!("Opening table files in {}", storage.path.display());
                Box::new(FileStore::open_with_timeout(&storage.path, storage.statement_timeout())?)
            }
        })
    }

    fn lifecycle_error(&self, action: &'static str) -> ModuleError {
        ModuleError::Lifecycle {
            module: SPAWNER_MODULE,
            action,
            state: self.state.as_str(),
        }
    }
}

impl Module for SpawnerModule {
    fn enable(&mut self) -> ModuleResult<()> {
        if self.state != State::Fresh {
            return Err(self.lifecycle_error("enable"));
        }
        self.register_types();

        let storage = self.open_storage()?;
        let worker = Arc::new(PersistenceWorker::start(storage, &self.config.storage.worker())?);
        let gateway = PersistenceGateway::new(
            Arc::clone(&self.service),
            Arc::clone(&worker),
            self.config.storage.gateway(),
        );
        gateway.ensure_schema()?;
        let report = gateway.load()?;

        self.service.add_observer(Arc::new(IncrementalSync::new(worker)));
        info!(
            "Spawner module ready: {} spawners, {} entities",
            report.spawners_loaded, report.entities_loaded
        );
        self.last_load = Some(report);
        self.gateway = Some(gateway);
        self.state = State::Enabled;
        Ok(())
    }

    fn disable(&mut self) -> ModuleResult<()> {
        if self.state != State::Enabled {
            return Err(self.lifecycle_error("disable"));
        }
        self.state = State::Disabled;
        let Some(gateway) = self.gateway.take() else {
            return Err(self.lifecycle_error("disable"));
        };

        let stopped = self.service.stop_all();
        info!("Stopped {stopped} spawner loops, saving");

        let report = gateway.save()?.wait()?;
        if report.aborted {
            error!("Shutdown save aborted, stored spawners are from the previous save");
        }
        self.last_save = Some(report);
        gateway.worker().drain()?;
        Ok(())
    }
}
