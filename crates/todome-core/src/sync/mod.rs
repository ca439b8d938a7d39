//! Sync between the local store and the remote authoritative store
//!
//! Local writes land in the store and the mutation queue first. The engine
//! pushes the queue in order and pulls remote rows newer than a per-kind
//! cursor, resolving collisions by last-writer-wins.

mod conflict;
mod engine;


pub use conflict::{comparison_timestamp, resolve, Resolution};
pub use engine::{SyncEngine, SyncReport};
