//! # SPAWNKEEP
//!
//! Spawner and entity lifecycle registry for a tick-driven game server.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                          spawnkeep_server                         │
//! │   ServerConfig ─> logging ─> ModuleRegistry ─> TickLoop           │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  SpawnerModule                                                    │
//! │  ┌──────────────────────┐        ┌─────────────────────────────┐  │
//! │  │ spawnkeep_core       │        │ spawnkeep_storage           │  │
//! │  │  • Registry (indices)│<──────>│  • PersistenceGateway       │  │
//! │  │  • Spawn/leash loops │        │  • PersistenceWorker        │  │
//! │  │  • SpawnerService    │───────>│  • IncrementalSync          │  │
//! │  └──────────┬───────────┘        └──────────────┬──────────────┘  │
//! │             │ HostWorld                         │ Storage         │
//! └─────────────┼───────────────────────────────────┼─────────────────┘
//!               ▼                                   ▼
//!          host world                      memory / table files
//! ```
//!
//! ## Modules
//!
//! - `config`: TOML server configuration
//! - `logging`: subscriber setup
//! - `module`: enable/disable lifecycle
//! - `spawners`: the spawner module
//! - `tick`: fixed-timestep server loop

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod logging;
pub mod module;
pub mod spawners;
pub mod tick;

pub use spawnkeep_core as core;
pub use spawnkeep_shared as shared;
pub use spawnkeep_storage as storage;

pub use config::{
    ConfigError, ConfigResult, LeashConfig, LoggingConfig, SchedulerConfig, ServerConfig,
    StorageBackend, StorageConfig,
};
pub use module::{Module, ModuleError, ModuleRegistry, ModuleResult};
pub use spawners::{SpawnerModule, SPAWNER_MODULE};
pub use tick::{TickLoop, TickStats};
