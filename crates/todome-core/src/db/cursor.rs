//! Per-kind pull cursors
//!
//! A cursor is the timestamp of the newest remote row already merged for a
//! kind. It lives in a key-value slot apart from the entity tables.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use rusqlite::OptionalExtension;

use super::connection::storage_error;
use super::Database;
use crate::error::Result;
use crate::models::EntityKind;

/// Durable key-value slot holding the last pull cursor per kind
pub trait CursorStore: Send + Sync + 'static {
    /// Cursor for `kind`, `None` before the first successful pull
    fn get(&self, kind: EntityKind) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Overwrite the cursor for `kind`
    fn set(&self, kind: EntityKind, value: &str) -> impl Future<Output = Result<()>> + Send;

    /// Forget every cursor so the next sync pulls everything
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;
}

/// `SQLite` implementation over the `sync_cursors` table
#[derive(Clone, Debug)]
pub struct SqliteCursorStore {
    db: Database,
}

impl SqliteCursorStore {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }
}

impl CursorStore for SqliteCursorStore {
    async fn get(&self, kind: EntityKind) -> Result<Option<String>> {
        self.db
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT value FROM sync_cursors WHERE kind = ?1",
                        [kind.table()],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await
    }

    async fn set(&self, kind: EntityKind, value: &str) -> Result<()> {
        let value = value.to_string();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO sync_cursors (kind, value) VALUES (?1, ?2)",
                    [kind.table(), value.as_str()],
                )?;
                Ok(())
            })
            .await
    }

    async fn clear(&self) -> Result<()> {
        self.db
            .call(|conn| {
                conn.execute("DELETE FROM sync_cursors", [])?;
                Ok(())
            })
            .await
    }
}

/// Process-local cursor store, for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: Mutex<HashMap<EntityKind, String>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<EntityKind, String>>> {
        self.cursors
            .lock()
            .map_err(|e| storage_error("Cursor store lock poisoned", e))
    }
}

impl CursorStore for MemoryCursorStore {
    async fn get(&self, kind: EntityKind) -> Result<Option<String>> {
        Ok(self.lock()?.get(&kind).cloned())
    }

    async fn set(&self, kind: EntityKind, value: &str) -> Result<()> {
        self.lock()?.insert(kind, value.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sqlite_cursor_roundtrip() {
        let store = SqliteCursorStore::new(Database::open_in_memory().unwrap());
        assert_eq!(store.get(EntityKind::Todo).await.unwrap(), None);

        store
            .set(EntityKind::Todo, "2024-01-01T00:00:00.000Z")
            .await
            .unwrap();
        store
            .set(EntityKind::Todo, "2024-01-02T00:00:00.000Z")
            .await
            .unwrap();

        assert_eq!(
            store.get(EntityKind::Todo).await.unwrap().as_deref(),
            Some("2024-01-02T00:00:00.000Z")
        );
        assert_eq!(store.get(EntityKind::Note).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sqlite_cursor_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cursors.db");

        {
            let store = SqliteCursorStore::new(Database::open(&path).unwrap());
            store
                .set(EntityKind::Attachment, "2024-02-01T00:00:00.000Z")
                .await
                .unwrap();
        }

        let store = SqliteCursorStore::new(Database::open(&path).unwrap());
        assert_eq!(
            store.get(EntityKind::Attachment).await.unwrap().as_deref(),
            Some("2024-02-01T00:00:00.000Z")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_forgets_everything() {
        let store = MemoryCursorStore::new();
        store.set(EntityKind::Note, "a").await.unwrap();
        store.set(EntityKind::Folder, "b").await.unwrap();

        store.clear().await.unwrap();

        assert_eq!(store.get(EntityKind::Note).await.unwrap(), None);
        assert_eq!(store.get(EntityKind::Folder).await.unwrap(), None);
    }
}
