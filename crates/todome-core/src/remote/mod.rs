//! Remote authoritative store
//!
//! The engine talks to the backend only through [`RemoteClient`]. The
//! production implementation is [`PostgrestClient`]; [`MemoryRemote`] is an
//! in-process backend for tests and local experiments.

mod memory;
mod postgrest;

use std::future::Future;

use serde_json::Value;
use thiserror::Error;

use crate::models::EntityKind;

pub use memory::{MemoryRemote, RemoteCall};
pub use postgrest::PostgrestClient;

/// Errors reported by a remote call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The request never got an answer (DNS, TLS, timeout, reset)
    #[error("Remote transport failed: {0}")]
    Transport(String),
    /// The remote answered and refused the request (validation, auth, conflict)
    #[error("Remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The remote answered with something we cannot interpret
    #[error("Invalid remote response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else if let Some(status) = error.status() {
            Self::Rejected {
                status: status.as_u16(),
                message: error.to_string(),
            }
        } else {
            Self::Transport(error.to_string())
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Per-kind access to the authoritative backend.
///
/// Rows are JSON objects whose keys are the remote column names.
pub trait RemoteClient: Send + Sync + 'static {
    /// Rows of `kind` whose cursor column is strictly greater than `since`
    /// (all rows when `since` is `None`), ascending by that column.
    fn fetch_since(
        &self,
        kind: EntityKind,
        since: Option<&str>,
    ) -> impl Future<Output = RemoteResult<Vec<Value>>> + Send;

    /// Insert a full record.
    ///
    /// Idempotent by `id`: inserting a row that already exists succeeds and
    /// leaves the stored row untouched. A queued `Create` may be replayed
    /// after a crash between the remote insert and the queue removal.
    fn insert(&self, kind: EntityKind, record: &Value)
        -> impl Future<Output = RemoteResult<()>> + Send;

    /// Apply `patch` to the record addressed by `id`.
    fn update_partial(
        &self,
        kind: EntityKind,
        id: &str,
        patch: &Value,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    /// Mark the record deleted, writing `fields` (such as a fresh
    /// `updated_at`) alongside the flag. Remote rows are never destroyed so
    /// that other devices see the deletion on their next pull.
    fn soft_delete(
        &self,
        kind: EntityKind,
        id: &str,
        fields: &Value,
    ) -> impl Future<Output = RemoteResult<()>> + Send {
        async move {
            let mut patch = fields.as_object().cloned().unwrap_or_default();
            patch.insert("is_deleted".to_string(), Value::Bool(true));
            self.update_partial(kind, id, &Value::Object(patch)).await
        }
    }
}
