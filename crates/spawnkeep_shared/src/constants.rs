//! # Shared Constants
//!
//! Defaults baked into the binary. Most of them can be overridden from the
//! server configuration file.

/// Bits to shift a block coordinate by to get its chunk coordinate (16-block chunks).
pub const CHUNK_SHIFT: u32 = 4;

/// Rows buffered per table before a batch is flushed to storage.
pub const INSERT_BATCH_SIZE: usize = 1000;

/// Per-statement storage timeout (seconds).
pub const STATEMENT_TIMEOUT_SECS: u64 = 15;

/// Leash loop period (ticks).
pub const DEFAULT_LEASH_PERIOD_TICKS: u64 = 10;

/// Maximum tether distance before a leashed entity is pulled back (blocks).
pub const DEFAULT_LEASH_DISTANCE: f64 = 16.0;
