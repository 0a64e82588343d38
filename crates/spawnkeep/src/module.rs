//! # Module Lifecycle
//!
//! Named units of functionality enabled at startup and disabled at
//! shutdown.
//!
//! ```text
//! register(a), register(b), register(c)
//! enable_all:  a → b → c     (a failure is logged, the rest continue)
//! disable_all: c → b → a     (only modules that enabled)
//! ```

use spawnkeep_core::RegistryError;
use spawnkeep_storage::StorageError;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::ConfigError;

/// Errors raised by modules and the module registry.
#[derive(Error, Debug)]
pub enum ModuleError {
    /// A module with this name is already registered.
    #[error("module {0:?} is already registered")]
    Conflict(String),

    /// The module cannot make this lifecycle transition.
    #[error("module {module:?} cannot {action} while {state}")]
    Lifecycle {
        /// Module name.
        module: &'static str,
        /// Requested transition.
        action: &'static str,
        /// Current state.
        state: &'static str,
    },

    /// Storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The registry rejected an operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// A unit the server enables and disables as a whole.
pub trait Module: Send {
    /// Starts the module.
    ///
    /// # Errors
    ///
    /// Whatever prevented the start; the module stays disabled.
    fn enable(&mut self) -> ModuleResult<()>;

    /// Stops the module and releases what it holds.
    ///
    /// # Errors
    ///
    /// Whatever failed during shutdown. The module counts as disabled anyway.
    fn disable(&mut self) -> ModuleResult<()>;
}

struct Entry {
    name: String,
    module: Box<dyn Module>,
    enabled: bool,
}

/// Modules in registration order.
#[derive(Default)]
pub struct ModuleRegistry {
    entries: Vec<Entry>,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module. The first registration of a name wins.
    ///
    /// # Errors
    ///
    /// [`ModuleError::Conflict`] if the name is taken.
    pub fn register(&mut self, name: &str, module: Box<dyn Module>) -> ModuleResult<()> {
        if self.entries.iter().any(|entry| entry.name == name) {
            warn!("Module {name} is already registered");
            return Err(ModuleError::Conflict(name.to_string()));
        }
        info!("Registered module {name}");
        self.entries.push(Entry {
            name: name.to_string(),
            module,
            enabled: false,
        });
        Ok(())
    }

    /// Enables every disabled module in registration order.
    ///
    /// Returns how many are enabled afterwards.
    pub fn enable_all(&mut self) -> usize {
        for entry in self.entries.iter_mut().filter(|entry| !entry.enabled) {
            match entry.module.enable() {
                Ok(()) => {
                    info!("Enabled module {}", entry.name);
                    entry.enabled = true;
                }
                Err(e) => error!("Could not enable module {}: {e}", entry.name),
            }
        }
        self.enabled_count()
    }

    /// Disables every enabled module in reverse registration order.
    ///
    /// Returns how many were disabled.
    pub fn disable_all(&mut self) -> usize {
        let mut disabled = 0;
        for entry in self.entries.iter_mut().rev().filter(|entry| entry.enabled) {
            if let Err(e) = entry.module.disable() {
                error!("Module {} did not shut down cleanly: {e}", entry.name);
            }
            info!("Disabled module {}", entry.name);
            entry.enabled = false;
            disabled += 1;
        }
        disabled
    }

    /// Returns true if the named module is enabled.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.name == name && entry.enabled)
    }

    /// Registered names, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    /// Number of enabled modules.
    #[must_use]
    pub fn enabled_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.enabled).count()
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
