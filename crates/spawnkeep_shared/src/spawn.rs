//! Why an entity exists.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provenance of a tracked entity.
///
/// Only [`SpawnReason::Spawner`] entities carry an origin spawn point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpawnReason {
    /// Produced by a spawn point.
    Spawner,
    /// Spawned by the host's own population rules.
    Natural,
    /// Summoned through an administrative command.
    Command,
    /// Provenance lost (e.g. the origin spawner no longer exists).
    Unknown,
}

impl SpawnReason {
    /// Stored name of the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spawner => "SPAWNER",
            Self::Natural => "NATURAL",
            Self::Command => "COMMAND",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for SpawnReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored spawn reason that is not one of the known names.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown spawn reason {0:?}")]
pub struct ParseSpawnReasonError(pub String);

impl FromStr for SpawnReason {
    type Err = ParseSpawnReasonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SPAWNER" => Ok(Self::Spawner),
            "NATURAL" => Ok(Self::Natural),
            "COMMAND" => Ok(Self::Command),
            "UNKNOWN" => Ok(Self::Unknown),
            other => Err(ParseSpawnReasonError(other.to_string())),
        }
    }
}
