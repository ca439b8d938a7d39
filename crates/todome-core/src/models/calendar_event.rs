//! Calendar event model

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Entity, EntityKind};
use crate::error::{Error, Result};
use crate::util::{new_id, now_iso, parse_timestamp};

/// A calendar event, optionally carrying a diary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Start (ISO-8601)
    pub start_at: String,
    /// End (ISO-8601), never before `start_at`
    pub end_at: String,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub diary_content: Option<Value>,
    #[serde(default)]
    pub remind_at: Option<String>,
    #[serde(default)]
    pub repeat_rule: Option<String>,
    #[serde(default)]
    pub repeat_parent_id: Option<String>,
    #[serde(default)]
    pub todo_ids: Vec<String>,
    /// Soft delete flag for sync
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl CalendarEvent {
    /// Create an event spanning `start_at..end_at`.
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        start_at: impl Into<String>,
        end_at: impl Into<String>,
    ) -> Result<Self> {
        let start_at = start_at.into();
        let end_at = end_at.into();

        let (Some(start), Some(end)) = (parse_timestamp(&start_at), parse_timestamp(&end_at)) else {
            return Err(Error::InvalidInput(
                "Event start_at/end_at must be ISO-8601 timestamps".to_string(),
            ));
        };
        if end < start {
            return Err(Error::InvalidInput(
                "Event end_at cannot be before start_at".to_string(),
            ));
        }

        let now = now_iso();
        Ok(Self {
            id: new_id(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            start_at,
            end_at,
            is_all_day: false,
            location: None,
            color: None,
            diary_content: None,
            remind_at: None,
            repeat_rule: None,
            repeat_parent_id: None,
            todo_ids: Vec::new(),
            is_deleted: false,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

impl Entity for CalendarEvent {
    const KIND: EntityKind = EntityKind::CalendarEvent;

    fn id(&self) -> &str {
        &self.id
    }
}
