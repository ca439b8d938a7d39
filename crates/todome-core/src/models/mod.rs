//! Data models for Todome

mod attachment;
mod calendar_event;
mod folder;
mod kind;
mod note;
mod queue_entry;
mod todo;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use attachment::{Attachment, ParentType};
pub use calendar_event::CalendarEvent;
pub use folder::Folder;
pub use kind::{EntityKind, KindPolicy};
pub use note::Note;
pub use queue_entry::{Operation, QueueEntry};
pub use todo::{RemindRepeat, Todo, TodoStatus};

/// A record kind the local store holds and the sync engine reconciles.
///
/// Serialized field names are the remote column names; the engine moves
/// records between stores as JSON objects keyed by those names.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Kind tag used for table dispatch.
    const KIND: EntityKind;

    /// Caller-assigned identifier, immutable for the life of the record.
    fn id(&self) -> &str;
}
