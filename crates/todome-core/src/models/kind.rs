//! Entity kinds and their per-kind sync policy

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Every record kind that takes part in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "notes")]
    Note,
    #[serde(rename = "folders")]
    Folder,
    #[serde(rename = "todos")]
    Todo,
    #[serde(rename = "calendar_events")]
    CalendarEvent,
    #[serde(rename = "attachments")]
    Attachment,
}

/// Static, data-driven behaviour of one entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindPolicy {
    /// Table name, shared by the local store and the remote API
    pub table: &'static str,
    /// Column used for incremental pulls and conflict comparison
    pub cursor_column: &'static str,
    /// Whether records carry an `is_deleted` flag
    pub supports_tombstone: bool,
    /// Whether records carry an `updated_at` column
    pub has_updated_at: bool,
}

const POLICIES: [KindPolicy; 5] = [
    KindPolicy {
        table: "notes",
        cursor_column: "updated_at",
        supports_tombstone: true,
        has_updated_at: true,
    },
    KindPolicy {
        table: "folders",
        cursor_column: "updated_at",
        supports_tombstone: false,
        has_updated_at: true,
    },
    KindPolicy {
        table: "todos",
        cursor_column: "updated_at",
        supports_tombstone: true,
        has_updated_at: true,
    },
    KindPolicy {
        table: "calendar_events",
        cursor_column: "updated_at",
        supports_tombstone: true,
        has_updated_at: true,
    },
    KindPolicy {
        table: "attachments",
        cursor_column: "created_at",
        supports_tombstone: false,
        has_updated_at: false,
    },
];

impl EntityKind {
    /// All kinds, in the order a sync cycle pulls them.
    pub const ALL: [Self; 5] = [
        Self::Note,
        Self::Folder,
        Self::Todo,
        Self::CalendarEvent,
        Self::Attachment,
    ];

    /// Policy row for this kind.
    pub const fn policy(self) -> KindPolicy {
        POLICIES[self as usize]
    }

    /// Table name for this kind.
    pub const fn table(self) -> &'static str {
        self.policy().table
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.table() == s.trim())
            .ok_or_else(|| Error::InvalidInput(format!("Unknown table: {s}")))
    }
}
