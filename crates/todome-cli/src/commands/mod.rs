pub mod common;
pub mod completions;
pub mod cursors;
pub mod note;
pub mod queue;
pub mod status;
pub mod sync;
pub mod todo;
pub mod watch;
