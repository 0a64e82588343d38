//! # SPAWNKEEP Storage
//!
//! Durable state for the spawner registry.
//!
//! ## Design Principles
//!
//! 1. **Off the main context** - every storage call runs on the
//!    [`PersistenceWorker`]; the main context only snapshots and reconciles
//! 2. **Explicit completion** - every job returns a [`JobHandle`], shutdown
//!    drains the worker instead of racing it
//! 3. **Full replace** - a save truncates both tables and rewrites them;
//!    the population is never stored, it is recomputed on load
//!
//! ## Example
//!
//! ```rust,ignore
//! use spawnkeep_storage::{MemoryStore, PersistenceWorker, PersistenceGateway};
//!
//! let worker = Arc::new(PersistenceWorker::start(Box::new(MemoryStore::new()), &WorkerConfig::default())?);
//! let gateway = PersistenceGateway::new(service, worker, GatewayConfig::default());
//! gateway.ensure_schema()?;
//! let report = gateway.load()?;
//! // ... run ...
//! gateway.save()?.wait()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod file;
pub mod gateway;
pub mod memory;
pub mod schema;
pub mod sync;
pub mod worker;

pub use backend::Storage;
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use gateway::{GatewayConfig, LoadReport, PersistenceGateway, SaveReport, TableWrite};
pub use memory::{MemoryHandle, MemoryStats, MemoryStore};
pub use schema::{EntityRow, SpawnerRow, Table};
pub use sync::IncrementalSync;
pub use worker::{JobHandle, PersistenceWorker, WorkerConfig, WorkerStats};
