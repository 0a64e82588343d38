//! # Type Configuration Store
//!
//! Write-once mapping from spawner type name to its parameters. The first
//! registration of a name wins; configs are handed out as shared immutable
//! `Arc`s so spawn loops can hold them without locking.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use spawnkeep_shared::SpawnerTypeConfig;
use tracing::info;

use crate::error::{RegistryError, RegistryResult};

/// Registered spawner types.
#[derive(Debug, Default)]
pub struct TypeConfigStore {
    types: RwLock<HashMap<String, Arc<SpawnerTypeConfig>>>,
}

impl TypeConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a spawner type.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Conflict`] if the name is taken,
    /// [`RegistryError::InvalidConfig`] if the parameters are unusable.
    pub fn register(&self, name: &str, config: SpawnerTypeConfig) -> RegistryResult<()> {
        config
            .validate()
            .map_err(|reason| RegistryError::InvalidConfig {
                name: name.to_string(),
                reason,
            })?;

        let mut types = self.types.write();
        if types.contains_key(name) {
            return Err(RegistryError::Conflict {
                kind: "spawner type",
                name: name.to_string(),
            });
        }

        info!("Registering spawner type {name}");
        types.insert(name.to_string(), Arc::new(config));
        Ok(())
    }

    /// Returns the parameters of a type, if registered.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Arc<SpawnerTypeConfig>> {
        self.types.read().get(name).cloned()
    }

    /// Returns the parameters of a type.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ConfigurationMissing`] if the type is unknown.
    pub fn require(&self, name: &str) -> RegistryResult<Arc<SpawnerTypeConfig>> {
        self.lookup(name)
            .ok_or_else(|| RegistryError::ConfigurationMissing(name.to_string()))
    }

    /// Returns true if the type is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.read().contains_key(name)
    }

    /// Returns the registered type names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_registration_wins() {
        let store = TypeConfigStore::new();
        store.register("wisp", SpawnerTypeConfig::wisp()).unwrap();

        let mut other = SpawnerTypeConfig::wisp();
        other.max_mobs = 99;
        let err = store.register("wisp", other).unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { .. }));
        assert_eq!(store.lookup("wisp").unwrap().max_mobs, 16);
    }

    #[test]
    fn test_missing_type() {
        let store = TypeConfigStore::new();
        assert!(store.lookup("ghost").is_none());
        assert_eq!(
            store.require("ghost").unwrap_err(),
            RegistryError::ConfigurationMissing("ghost".to_string())
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let store = TypeConfigStore::new();
        let mut config = SpawnerTypeConfig::wisp();
        config.cooldown = 0;
        assert!(matches!(
            store.register("broken", config),
            Err(RegistryError::InvalidConfig { .. })
        ));
        assert!(!store.contains("broken"));
    }
}
