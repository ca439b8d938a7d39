//! Mutation queue entry model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::EntityKind;
use crate::error::Error;

/// Kind of local write a queue entry represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!("Unknown operation: {other}"))),
        }
    }
}

/// A pending local write not yet confirmed by the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Auto-increment position; insertion order is causal order
    pub sequence: i64,
    pub table: EntityKind,
    pub record_id: String,
    pub operation: Operation,
    /// Full record for `Create`, the patch for `Update`
    pub payload: Value,
    /// When the entry was queued (ISO-8601)
    pub enqueued_at: String,
}
