//! Database connection management

use crate::error::{Error, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::migrations;

/// Shared handle to the local `SQLite` database.
///
/// Cloning is cheap; every clone talks to the same connection. Each call runs
/// under the connection lock, so a single statement or transaction is never
/// interleaved with another writer.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        Self::init(conn, Some(path))
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        Self::configure(&conn)?;
        migrations::run(&mut conn)?;
        tracing::debug!(
            "Opened local store at {}",
            path.as_deref()
                .map_or_else(|| ":memory:".to_string(), |p| p.display().to_string())
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Configure `SQLite` for durability with reasonable write throughput
    fn configure(conn: &Connection) -> Result<()> {
        // WAL is unavailable for in-memory databases; the pragma just reports "memory"
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        Ok(())
    }

    /// Run `f` with exclusive access to the connection.
    pub async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().await;
        f(&mut conn)
    }

    /// Filesystem path, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

/// Map a poisoned or otherwise unusable result into a database error.
pub(crate) fn storage_error(context: &str, error: impl std::fmt::Display) -> Error {
    Error::Database(format!("{context}: {error}"))
}
