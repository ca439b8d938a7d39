//! Error types for todome-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using todome-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in todome-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The device reported no network connection
    #[error("Device is offline")]
    Offline,

    /// A full sync cycle is already running
    #[error("Sync already in progress")]
    SyncInProgress,

    /// The remote store rejected or failed a request
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Push stopped at a queue entry; everything after it stays queued
    #[error("Push halted at queue entry {sequence} after {pushed} change(s): {source}")]
    PushHalted {
        pushed: usize,
        sequence: i64,
        #[source]
        source: RemoteError,
    },
}

impl Error {
    /// Whether this error only means "no network right now".
    pub const fn is_connectivity(&self) -> bool {
        match self {
            Self::Offline => true,
            Self::Remote(error) | Self::PushHalted { source: error, .. } => error.is_transport(),
            _ => false,
        }
    }

    /// Whether retrying the same operation later can succeed without any
    /// change to local data.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Offline | Self::SyncInProgress) || self.is_connectivity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_and_in_progress_are_retryable() {
        assert!(Error::Offline.is_retryable());
        assert!(Error::Offline.is_connectivity());
        assert!(Error::SyncInProgress.is_retryable());
        assert!(!Error::SyncInProgress.is_connectivity());
    }

    #[test]
    fn rejections_are_not_retryable() {
        let error = Error::PushHalted {
            pushed: 2,
            sequence: 7,
            source: RemoteError::Rejected {
                status: 422,
                message: "violates check constraint".to_string(),
            },
        };
        assert!(!error.is_retryable());
        assert!(error.to_string().contains("queue entry 7"));
    }

    #[test]
    fn transport_failures_count_as_connectivity() {
        let error = Error::Remote(RemoteError::Transport("connection reset".to_string()));
        assert!(error.is_connectivity());
        assert!(error.is_retryable());
    }
}
