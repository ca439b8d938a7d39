//! Attachment metadata model

use serde::{Deserialize, Serialize};

use super::{Entity, EntityKind};
use crate::error::{Error, Result};
use crate::util::{new_id, now_iso};

/// Record kind an attachment hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentType {
    Note,
    Todo,
    Event,
}

impl ParentType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Todo => "todo",
            Self::Event => "event",
        }
    }
}

/// Attachment metadata. The binary lives in object storage at `storage_path`.
///
/// Attachments are immutable once uploaded, so they only carry `created_at`
/// and have no tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub user_id: String,
    pub parent_type: ParentType,
    pub parent_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_path: String,
    pub created_at: String,
}

impl Attachment {
    /// Create a new attachment metadata record.
    pub fn new(
        user_id: impl Into<String>,
        parent_type: ParentType,
        parent_id: impl Into<String>,
        file_name: impl Into<String>,
        file_size: i64,
        mime_type: impl Into<String>,
        storage_path: impl Into<String>,
    ) -> Result<Self> {
        let file_name = file_name.into().trim().to_string();
        let mime_type = mime_type.into().trim().to_string();
        let storage_path = storage_path.into().trim().to_string();

        if file_name.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment file_name cannot be empty".to_string(),
            ));
        }
        if mime_type.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment mime_type cannot be empty".to_string(),
            ));
        }
        if storage_path.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment storage_path cannot be empty".to_string(),
            ));
        }
        if file_size < 0 {
            return Err(Error::InvalidInput(
                "Attachment file_size cannot be negative".to_string(),
            ));
        }

        Ok(Self {
            id: new_id(),
            user_id: user_id.into(),
            parent_type,
            parent_id: parent_id.into(),
            file_name,
            file_size,
            mime_type,
            storage_path,
            created_at: now_iso(),
        })
    }
}

impl Entity for Attachment {
    const KIND: EntityKind = EntityKind::Attachment;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_new() {
        let attachment = Attachment::new(
            "u1",
            ParentType::Note,
            "note-1",
            "image.png",
            1234,
            "image/png",
            "u1/note-1/image.png",
        )
        .unwrap();

        assert_eq!(attachment.file_name, "image.png");
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.file_size, 1234);
        assert_eq!(attachment.parent_type.as_str(), "note");
    }

    #[test]
    fn test_attachment_validation() {
        let new = |name: &str, size: i64, mime: &str, path: &str| {
            Attachment::new("u1", ParentType::Todo, "t1", name, size, mime, path)
        };

        assert!(new("", 1, "image/png", "key").is_err());
        assert!(new("file", 1, "", "key").is_err());
        assert!(new("file", 1, "image/png", "").is_err());
        assert!(new("file", -1, "image/png", "key").is_err());
    }
}
