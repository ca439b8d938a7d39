//! Todo model

use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind};
use crate::error::{Error, Result};
use crate::util::{new_id, now_iso};

/// Valid todo priorities, 1 (highest) to 4
pub const TODO_PRIORITIES: [u8; 4] = [1, 2, 3, 4];

/// Default priority for quick-added todos
pub const DEFAULT_PRIORITY: u8 = 2;

/// Todo workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TodoStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Reminder repetition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemindRepeat {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// A todo item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub detail: Option<String>,
    pub priority: u8,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub remind_at: Option<String>,
    #[serde(default)]
    pub remind_repeat: Option<RemindRepeat>,
    /// Notes linked to this todo
    #[serde(default)]
    pub note_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sort_order: i64,
    /// Soft delete flag for sync
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Todo {
    /// Create a pending todo with the default priority.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Result<Self> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(Error::InvalidInput("Todo title cannot be empty".to_string()));
        }

        let now = now_iso();
        Ok(Self {
            id: new_id(),
            user_id: user_id.into(),
            title,
            detail: None,
            priority: DEFAULT_PRIORITY,
            status: TodoStatus::Pending,
            due_date: None,
            remind_at: None,
            remind_repeat: Some(RemindRepeat::None),
            note_ids: Vec::new(),
            tags: Vec::new(),
            sort_order: 0,
            is_deleted: false,
            completed_at: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Set the priority, rejecting values outside 1..=4.
    pub fn with_priority(mut self, priority: u8) -> Result<Self> {
        if !TODO_PRIORITIES.contains(&priority) {
            return Err(Error::InvalidInput(format!(
                "Todo priority must be 1-4, got {priority}"
            )));
        }
        self.priority = priority;
        Ok(self)
    }
}

impl Entity for Todo {
    const KIND: EntityKind = EntityKind::Todo;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_todo_new_defaults() {
        let todo = Todo::new("u1", "  Buy milk ").unwrap();
        assert_eq!(todo.title, "Buy milk");
        assert_eq!(todo.status, TodoStatus::Pending);
        assert_eq!(todo.priority, DEFAULT_PRIORITY);
        assert!(!todo.is_deleted);
    }

    #[test]
    fn test_todo_validation() {
        assert!(Todo::new("u1", "   ").is_err());
        let todo = Todo::new("u1", "Ship it").unwrap();
        assert!(todo.clone().with_priority(0).is_err());
        assert!(todo.clone().with_priority(5).is_err());
        assert_eq!(todo.with_priority(1).unwrap().priority, 1);
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&TodoStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(TodoStatus::InProgress.as_str(), "in_progress");
    }
}
