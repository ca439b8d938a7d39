//! Folder model

use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind};
use crate::util::{new_id, now_iso};

/// A folder grouping notes. Folders carry no tombstone: local deletion is
/// destructive and only a soft-delete signal is sent remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Folder {
    #[must_use]
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = now_iso();
        Self {
            id: new_id(),
            user_id: user_id.into(),
            name: name.into(),
            color: None,
            icon: None,
            parent_id: None,
            sort_order: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

impl Entity for Folder {
    const KIND: EntityKind = EntityKind::Folder;

    fn id(&self) -> &str {
        &self.id
    }
}
