//! # Spawn Strategies
//!
//! Per-type creation and setup logic, looked up by type name. Types without
//! a registered strategy use [`HostSpawnStrategy`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use spawnkeep_shared::{EntityId, Location};
use tracing::info;

use crate::error::{RegistryError, RegistryResult};
use crate::host::HostWorld;

/// Creation and setup of one entity type.
pub trait SpawnStrategy: Send + Sync {
    /// Creates an entity at `at`.
    fn create(&self, host: &dyn HostWorld, type_name: &str, at: &Location) -> Option<EntityId>;

    /// Type-specific setup, run after creation and after a load reconciles
    /// the entity. Returning false discards the entity from the registry.
    ///
    /// The entity is not removed from the host. A strategy that refuses a
    /// freshly created entity must remove it itself, or it lives on
    /// untracked and outside every population cap.
    fn setup(&self, host: &dyn HostWorld, id: EntityId) -> bool;
}

/// Asks the host to create the entity; setup only checks it resolves.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostSpawnStrategy;

impl SpawnStrategy for HostSpawnStrategy {
    fn create(&self, host: &dyn HostWorld, type_name: &str, at: &Location) -> Option<EntityId> {
        host.create_entity(type_name, at)
    }

    fn setup(&self, host: &dyn HostWorld, id: EntityId) -> bool {
        host.entity_exists(id)
    }
}

/// Type name to strategy.
pub struct StrategyRegistry {
    strategies: RwLock<HashMap<String, Arc<dyn SpawnStrategy>>>,
    fallback: Arc<dyn SpawnStrategy>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self {
            strategies: RwLock::new(HashMap::new()),
            fallback: Arc::new(HostSpawnStrategy),
        }
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.strategies.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("StrategyRegistry")
            .field("strategies", &names)
            .finish_non_exhaustive()
    }
}

impl StrategyRegistry {
    /// Creates a registry that falls back to [`HostSpawnStrategy`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the strategy of a type.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Conflict`] if the type already has one.
    pub fn register(&self, type_name: &str, strategy: Arc<dyn SpawnStrategy>) -> RegistryResult<()> {
        let mut strategies = self.strategies.write();
        if strategies.contains_key(type_name) {
            return Err(RegistryError::Conflict {
                kind: "spawn strategy",
                name: type_name.to_string(),
            });
        }
        info!("Registering spawn strategy for {type_name}");
        strategies.insert(type_name.to_string(), strategy);
        Ok(())
    }

    /// Strategy of a type, or the fallback.
    #[must_use]
    pub fn get(&self, type_name: &str) -> Arc<dyn SpawnStrategy> {
        self.strategies
            .read()
            .get(type_name)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    /// Returns true if the type has its own strategy.
    #[must_use]
    pub fn has_custom(&self, type_name: &str) -> bool {
        self.strategies.read().contains_key(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Refusing;

    impl SpawnStrategy for Refusing {
        fn create(&self, _: &dyn HostWorld, _: &str, _: &Location) -> Option<EntityId> {
            None
        }

        fn setup(&self, _: &dyn HostWorld, _: EntityId) -> bool {
            false
        }
    }

    #[test]
    fn test_duplicate_strategy_rejected() {
        let registry = StrategyRegistry::new();
        registry.register("wisp", Arc::new(Refusing)).unwrap();
        assert!(matches!(
            registry.register("wisp", Arc::new(HostSpawnStrategy)),
            Err(RegistryError::Conflict { kind: "spawn strategy", .. })
        ));
        assert!(registry.has_custom("wisp"));
        assert!(!registry.has_custom("fire_wisp"));
    }
}
