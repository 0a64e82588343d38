//! # Server Configuration
//!
//! Loaded once at startup from a TOML file. Every section is optional; a
//! missing section takes its defaults, and a file without any
//! `[[spawner_types]]` gets the built-in `wisp` and `fire_wisp` types.
//!
//! ```toml
//! [logging]
//! level = "info"          # or: debug = 2  (1 trace, 2 info, 3 warn, 4 error)
//!
//! [storage]
//! backend = "file"        # "memory" | "file"
//! path = "data/spawnkeep"
//! statement_timeout_secs = 15
//! batch_size = 1000
//!
//! [leash]
//! max_distance = 16.0
//! period_ticks = 10
//!
//! [scheduler]
//! seed = 42
//! tick_rate = 20
//!
//! [[spawner_types]]
//! name = "wisp"
//! radius_x = 8.0
//! # ...
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spawnkeep_core::{LeashSettings, ServiceSettings};
use spawnkeep_shared::{
    SpawnerTypeConfig, SpawnerTypeEntry, DEFAULT_LEASH_DISTANCE, DEFAULT_LEASH_PERIOD_TICKS,
    INSERT_BATCH_SIZE, STATEMENT_TIMEOUT_SECS,
};
use spawnkeep_storage::{GatewayConfig, WorkerConfig};
use thiserror::Error;
use tracing::Level;

/// Default server tick rate (ticks per second).
pub const DEFAULT_TICK_RATE: u32 = 20;

/// Errors raised while reading the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema (includes unknown backends).
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but cannot be used.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Full server configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `[logging]`
    pub logging: LoggingConfig,
    /// `[storage]`
    pub storage: StorageConfig,
    /// `[leash]`
    pub leash: LeashConfig,
    /// `[scheduler]`
    pub scheduler: SchedulerConfig,
    /// `[[spawner_types]]`
    pub spawner_types: Vec<SpawnerTypeEntry>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            leash: LeashConfig::default(),
            scheduler: SchedulerConfig::default(),
            spawner_types: vec![
                SpawnerTypeEntry {
                    name: "wisp".to_string(),
                    config: SpawnerTypeConfig::wisp(),
                },
                SpawnerTypeEntry {
                    name: "fire_wisp".to_string(),
                    config: SpawnerTypeConfig::fire_wisp(),
                },
            ],
        }
    }
}

/// `[logging]` section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level name (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: Option<String>,
    /// Numeric level: 1 trace, 2 info, 3 warn, 4 error. `level` wins if both are set.
    pub debug: Option<u8>,
}

impl LoggingConfig {
    /// Resolves the maximum log level. Defaults to `info`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for an unknown name or a number outside 1..=4.
    pub fn max_level(&self) -> ConfigResult<Level> {
        if let Some(name) = &self.level {
            return Level::from_str(name)
                .map_err(|_| ConfigError::Invalid(format!("unknown log level {name:?}")));
        }
        match self.debug {
            None | Some(2) => Ok(Level::INFO),
            Some(1) => Ok(Level::TRACE),
            Some(3) => Ok(Level::WARN),
            Some(4) => Ok(Level::ERROR),
            Some(n) => Err(ConfigError::Invalid(format!("debug must be 1..=4, got {n}"))),
        }
    }
}

/// Storage backend selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-lifetime in-memory tables.
    #[default]
    Memory,
    /// Checksummed table files in `path`.
    File,
}

/// `[storage]` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which store to open.
    pub backend: StorageBackend,
    /// Directory of the file backend.
    pub path: PathBuf,
    /// Per-statement timeout.
    pub statement_timeout_secs: u64,
    /// Rows per insert batch.
    pub batch_size: usize,
    /// Persistence worker queue bound.
    pub queue_capacity: usize,
    /// How long startup waits for the stored rows.
    pub load_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("spawnkeep-data"),
            statement_timeout_secs: STATEMENT_TIMEOUT_SECS,
            batch_size: INSERT_BATCH_SIZE,
            queue_capacity: WorkerConfig::default().queue_capacity,
            load_timeout_secs: 30,
        }
    }
}

impl StorageConfig {
    /// Statement timeout as a duration.
    #[must_use]
    pub const fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }

    /// Gateway settings.
    #[must_use]
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            batch_size: self.batch_size,
            load_timeout: Duration::from_secs(self.load_timeout_secs),
        }
    }

    /// Worker settings.
    #[must_use]
    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            queue_capacity: self.queue_capacity,
        }
    }
}

/// `[leash]` section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeashConfig {
    /// Tether radius (blocks).
    pub max_distance: f64,
    /// Leash loop period (ticks).
    pub period_ticks: u64,
}

impl Default for LeashConfig {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_LEASH_DISTANCE,
            period_ticks: DEFAULT_LEASH_PERIOD_TICKS,
        }
    }
}

/// `[scheduler]` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Fixed spawn RNG seed; entropy if absent.
    pub seed: Option<u64>,
    /// Ticks per second of the server loop.
    pub tick_rate: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            seed: None,
            tick_rate: DEFAULT_TICK_RATE,
        }
    }
}

impl ServerConfig {
    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses and validates a configuration document.
    ///
    /// # Errors
    ///
    /// See [`ConfigError`].
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values the schedulers and the worker cannot run with.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> ConfigResult<()> {
        self.logging.max_level()?;
        if self.storage.batch_size == 0 {
            return Err(ConfigError::Invalid("storage.batch_size must be positive".into()));
        }
        if self.storage.queue_capacity == 0 {
            return Err(ConfigError::Invalid("storage.queue_capacity must be positive".into()));
        }
        if self.scheduler.tick_rate == 0 {
            return Err(ConfigError::Invalid("scheduler.tick_rate must be positive".into()));
        }
        if self.leash.period_ticks == 0 {
            return Err(ConfigError::Invalid("leash.period_ticks must be positive".into()));
        }
        if !(self.leash.max_distance.is_finite() && self.leash.max_distance >= 0.0) {
            return Err(ConfigError::Invalid(
                "leash.max_distance must be finite and non-negative".into(),
            ));
        }
        for entry in &self.spawner_types {
            entry
                .config
                .validate()
                .map_err(|reason| ConfigError::Invalid(format!("spawner type {:?}: {reason}", entry.name)))?;
        }
        Ok(())
    }

    /// Settings handed to the spawner service.
    #[must_use]
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            leash: LeashSettings {
                max_distance: self.leash.max_distance,
                period_ticks: self.leash.period_ticks,
            },
            seed: self.scheduler.seed,
        }
    }
}
