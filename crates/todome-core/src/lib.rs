//! todome-core - Core library for Todome
//!
//! This crate contains the shared models, the local store, the durable
//! mutation queue, and the sync engine that reconciles local state with the
//! remote authoritative store. Every client interface (CLI, desktop, web
//! bridge) routes writes through [`repository::Repository`].

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod repository;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Entity, EntityKind, Operation};
pub use remote::{RemoteClient, RemoteError};
pub use repository::Repository;
pub use state::{SyncState, SyncStatus};
pub use sync::{SyncEngine, SyncReport};
