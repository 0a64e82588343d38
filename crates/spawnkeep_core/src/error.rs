//! # Registry Error Types
//!
//! Errors surfaced to callers of the administrative surface. Reconciliation
//! problems never show up here; they are logged and recovered locally.

use spawnkeep_shared::SpawnerLocation;
use thiserror::Error;

/// Errors that can occur in the spawner registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A spawner type or strategy with this name is already registered.
    #[error("{kind} {name:?} is already registered")]
    Conflict {
        /// What was being registered ("spawner type", "spawn strategy").
        kind: &'static str,
        /// The duplicate name.
        name: String,
    },

    /// The requested spawner type has no registered configuration.
    #[error("no configuration for spawner type {0:?}")]
    ConfigurationMissing(String),

    /// No spawner is registered at the location.
    #[error("no spawner at {0}")]
    SpawnerNotFound(SpawnerLocation),

    /// A spawner type configuration was rejected.
    #[error("invalid configuration for spawner type {name:?}: {reason}")]
    InvalidConfig {
        /// Type name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The host refused to create the entity.
    #[error("host could not create a {0:?} entity")]
    HostRejected(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
