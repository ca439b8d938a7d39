//! Note model

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Entity, EntityKind};
use crate::util::{new_id, now_iso};

/// A rich-text note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Title shown in lists
    pub title: String,
    /// Editor document (opaque JSON)
    #[serde(default)]
    pub content: Option<Value>,
    /// Plain-text rendering of `content`, used for search
    #[serde(default)]
    pub plain_text: Option<String>,
    /// Containing folder
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_archived: bool,
    /// Soft delete flag for sync
    #[serde(default)]
    pub is_deleted: bool,
    /// Creation timestamp (ISO-8601, UTC)
    pub created_at: String,
    /// Last update timestamp (ISO-8601, UTC)
    pub updated_at: String,
    /// When the server last confirmed this note
    #[serde(default)]
    pub synced_at: Option<String>,
}

impl Note {
    /// Create an empty note owned by `user_id`
    #[must_use]
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = now_iso();
        Self {
            id: new_id(),
            user_id: user_id.into(),
            title: title.into(),
            content: None,
            plain_text: None,
            folder_id: None,
            tags: Vec::new(),
            is_pinned: false,
            is_archived: false,
            is_deleted: false,
            created_at: now.clone(),
            updated_at: now,
            synced_at: None,
        }
    }
}

impl Entity for Note {
    const KIND: EntityKind = EntityKind::Note;

    fn id(&self) -> &str {
        &self.id
    }
}
