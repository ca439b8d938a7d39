//! Database layer for Todome

mod connection;
mod cursor;
mod migrations;
mod queue;
mod store;

pub use connection::Database;
pub use cursor::{CursorStore, MemoryCursorStore, SqliteCursorStore};
pub use queue::MutationQueue;
pub use store::LocalStore;
