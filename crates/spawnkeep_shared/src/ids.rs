//! # Identifiers
//!
//! Spawners and entities are identified by UUIDs. The textual form is the
//! 36-character hyphenated UUID, which is what the storage schema holds.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// An identifier string that is not a UUID.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid identifier {input:?}: {reason}")]
pub struct ParseIdError {
    /// The rejected input.
    pub input: String,
    /// Parser message.
    pub reason: String,
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            #[must_use]
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self).map_err(|e| ParseIdError {
                    input: s.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    };
}

uuid_id!(
    /// Opaque spawner id. Stable across restarts; not the spawner's identity
    /// in the index (the location is).
    SpawnerId
);

uuid_id!(
    /// Identity of a live entity in the host world.
    EntityId
);
