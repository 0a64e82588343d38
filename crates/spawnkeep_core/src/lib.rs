//! # SPAWNKEEP Core
//!
//! Spawner and entity lifecycle registry.
//!
//! ## Design Principles
//!
//! 1. **Explicit wiring** - indices, type store, strategies, host and
//!    scheduler are constructed by the caller and injected; no globals
//! 2. **Immutable keys** - spawn points are keyed by a normalized
//!    [`SpawnerLocation`](spawnkeep_shared::SpawnerLocation)
//! 3. **Cancellable loops** - every loop has a handle, deleting a spawner
//!    cancels its loops before its entries disappear
//!
//! ## Example
//!
//! ```rust,ignore
//! use spawnkeep_core::{SpawnerService, TickScheduler, SimWorld};
//!
//! let service = SpawnerService::new(types, registry, strategies, host, scheduler, settings);
//! let id = service.register_spawner("wisp", &location, None)?;
//! scheduler.advance(40);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod host;
pub mod index;
pub mod scheduler;
pub mod service;
pub mod sim;
pub mod strategy;
pub mod tasks;
pub mod types;

pub use error::{RegistryError, RegistryResult};
pub use host::HostWorld;
pub use index::{EntityIndex, EntityRecord, Registry, SpawnerIndex, SpawnerRecord, Tracked};
pub use scheduler::{RepeatingTask, TaskControl, TaskHandle, TaskScheduler, TickScheduler};
pub use service::{ServiceSettings, SpawnerObserver, SpawnerService};
pub use sim::SimWorld;
pub use strategy::{HostSpawnStrategy, SpawnStrategy, StrategyRegistry};
pub use tasks::{LeashOutcome, LeashSettings, LeashTask, SpawnOutcome, SpawnTask, TaskContext};
pub use types::TypeConfigStore;
