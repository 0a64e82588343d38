//! # Storage Error Types

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Connection or transaction failure.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A statement ran past its timeout.
    #[error("statement exceeded its {0:?} timeout")]
    Timeout(Duration),

    /// A stored record failed its integrity check.
    #[error("corrupt record in {table}: {reason}")]
    Corrupt {
        /// Table name.
        table: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// The worker queue is full.
    #[error("persistence queue is full")]
    Backpressure,

    /// The worker has stopped.
    #[error("persistence worker has stopped")]
    WorkerGone,
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
