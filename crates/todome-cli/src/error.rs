use std::io;

use thiserror::Error;
use todome_core::EntityKind;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] todome_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Title cannot be empty")]
    EmptyTitle,
    #[error("Record ID cannot be empty")]
    EmptyId,
    #[error("No {kind} record matches id/prefix: {query}")]
    RecordNotFound { kind: EntityKind, query: String },
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error(
        "Sync is not configured. Set TODOME_REMOTE_URL and TODOME_API_KEY (a .env file works too)."
    )]
    SyncNotConfigured,
}
