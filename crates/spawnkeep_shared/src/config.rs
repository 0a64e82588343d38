//! # Spawner Type Configuration
//!
//! Tunables shared by every spawn point of one type. Registered once per
//! type and read-only afterwards.
//!
//! Keys accept both the snake_case form used in the server's TOML file and
//! the camelCase names the command layer uses (`radiusX`, `maxMobs`, ...).

use serde::{Deserialize, Serialize};

/// Parameters of one spawner type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnerTypeConfig {
    /// Horizontal spawn radius (blocks, applied to X and Z).
    #[serde(alias = "radiusX")]
    pub radius_x: f64,
    /// Vertical spawn radius (blocks).
    #[serde(alias = "radiusY")]
    pub radius_y: f64,
    /// Readiness threshold before a spawn attempt fires (ticks).
    pub warmup: u32,
    /// Scheduling period of the spawn loop, also the readiness increment (ticks).
    pub cooldown: u32,
    /// Population cap per spawn point.
    #[serde(alias = "maxMobs")]
    pub max_mobs: u32,
    /// Placements tried per attempt.
    #[serde(alias = "mobsPerAttempt")]
    pub mobs_per_attempt: u32,
    /// Only spawn when a player is within `activation_range`.
    #[serde(alias = "checkForPlayers")]
    pub check_for_players: bool,
    /// Player distance that opens the gate (blocks).
    #[serde(alias = "activationRange")]
    pub activation_range: f64,
    /// Leash flag used when a spawner is registered without one.
    #[serde(alias = "hasLeashDefault", default)]
    pub has_leash_default: bool,
}

impl SpawnerTypeConfig {
    /// Built-in `wisp` parameters.
    #[must_use]
    pub const fn wisp() -> Self {
        Self {
            radius_x: 8.0,
            radius_y: 1.0,
            warmup: 400,
            cooldown: 40,
            max_mobs: 16,
            mobs_per_attempt: 1,
            check_for_players: true,
            activation_range: 40.0,
            has_leash_default: false,
        }
    }

    /// Built-in `fire_wisp` parameters.
    #[must_use]
    pub const fn fire_wisp() -> Self {
        Self::wisp()
    }

    /// Checks the values are usable by the schedulers.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.cooldown == 0 {
            return Err("cooldown must be at least one tick");
        }
        if !(self.radius_x.is_finite() && self.radius_x >= 0.0) {
            return Err("radius_x must be finite and non-negative");
        }
        if !(self.radius_y.is_finite() && self.radius_y >= 0.0) {
            return Err("radius_y must be finite and non-negative");
        }
        if !(self.activation_range.is_finite() && self.activation_range >= 0.0) {
            return Err("activation_range must be finite and non-negative");
        }
        Ok(())
    }

    /// Number of invocations between two spawn attempts after a reset.
    #[must_use]
    pub const fn invocations_between_attempts(&self) -> u32 {
        if self.cooldown == 0 {
            return 0;
        }
        self.warmup.div_ceil(self.cooldown)
    }
}

/// A named spawner type, as written in a `[[spawner_types]]` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnerTypeEntry {
    /// Type name.
    pub name: String,
    /// Parameters.
    #[serde(flatten)]
    pub config: SpawnerTypeConfig,
}
