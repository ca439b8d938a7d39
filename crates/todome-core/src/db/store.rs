//! Local store: the materialized state of every entity kind
//!
//! Records are kept as JSON documents keyed by `(kind, id)`. The sync engine
//! works on raw JSON rows as they arrive from the remote; application code
//! uses the typed accessors.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

use super::connection::storage_error;
use super::Database;
use crate::error::{Error, Result};
use crate::models::{Attachment, CalendarEvent, Entity, EntityKind, Note, ParentType, Todo, TodoStatus};

/// Durable, keyed store for every entity kind
#[derive(Clone, Debug)]
pub struct LocalStore {
    db: Database,
}

/// Index columns copied out of a record before it is written.
struct RowKeys<'a> {
    id: &'a str,
    user_id: &'a str,
    is_deleted: bool,
    created_at: &'a str,
    updated_at: Option<&'a str>,
}

impl<'a> RowKeys<'a> {
    fn from_record(kind: EntityKind, record: &'a Value) -> Result<Self> {
        let Some(object) = record.as_object() else {
            return Err(Error::InvalidInput(format!(
                "{kind} record must be a JSON object"
            )));
        };

        let id = object
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::InvalidInput(format!("{kind} record is missing an id")))?;

        Ok(Self {
            id,
            user_id: object.get("user_id").and_then(Value::as_str).unwrap_or_default(),
            is_deleted: object
                .get("is_deleted")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            created_at: object
                .get("created_at")
                .and_then(Value::as_str)
                .unwrap_or_default(),
            updated_at: object.get("updated_at").and_then(Value::as_str),
        })
    }
}

impl LocalStore {
    /// Create a store over the given database
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Underlying database handle
    pub const fn database(&self) -> &Database {
        &self.db
    }

    // -----------------------------------------------------------------------
    // Raw JSON access (used by the sync engine)
    // -----------------------------------------------------------------------

    /// Point lookup by id, tombstoned rows included.
    pub async fn get_raw(&self, kind: EntityKind, id: &str) -> Result<Option<Value>> {
        let id = id.to_string();
        self.db
            .call(move |conn| get_row(conn, kind, &id))
            .await
    }

    /// Idempotent overwrite keyed by the record's `id`.
    pub async fn put_raw(&self, kind: EntityKind, record: &Value) -> Result<()> {
        let record = record.clone();
        self.db
            .call(move |conn| put_row(conn, kind, &record))
            .await
    }

    /// Overwrite many records in one transaction; either all land or none do.
    pub async fn bulk_put_raw(&self, kind: EntityKind, records: &[Value]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let records = records.to_vec();
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                for record in &records {
                    put_row(&tx, kind, record)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
    }

    /// Destructive local delete. Returns whether a row was removed.
    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.db
            .call(move |conn| {
                let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table());
                Ok(conn.execute(&sql, params![id])? > 0)
            })
            .await
    }

    /// Number of rows of `kind`, tombstones included
    pub async fn count(&self, kind: EntityKind) -> Result<usize> {
        self.db
            .call(move |conn| {
                let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
                let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
                usize::try_from(count).map_err(|e| storage_error("Invalid row count", e))
            })
            .await
    }

    // -----------------------------------------------------------------------
    // Typed access
    // -----------------------------------------------------------------------

    /// Get a record by id, tombstoned rows included
    pub async fn get<T: Entity>(&self, id: &str) -> Result<Option<T>> {
        self.get_raw(T::KIND, id)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Write a record, replacing any previous version
    pub async fn put<T: Entity>(&self, record: &T) -> Result<()> {
        self.put_raw(T::KIND, &serde_json::to_value(record)?).await
    }

    /// Write many records atomically
    pub async fn bulk_put<T: Entity>(&self, records: &[T]) -> Result<()> {
        let values = records
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?;
        self.bulk_put_raw(T::KIND, &values).await
    }

    /// List a user's live records, most recently changed first
    pub async fn list_by_owner<T: Entity>(&self, user_id: &str) -> Result<Vec<T>> {
        let sql = format!(
            "SELECT data FROM {} WHERE user_id = ?1 AND is_deleted = 0
             ORDER BY COALESCE(updated_at, created_at) DESC",
            T::KIND.table()
        );
        self.query(sql, vec![user_id.to_string()]).await
    }

    /// List a user's live records carrying `tag` (notes and todos)
    pub async fn list_by_tag<T: Entity>(&self, user_id: &str, tag: &str) -> Result<Vec<T>> {
        if !matches!(T::KIND, EntityKind::Note | EntityKind::Todo) {
            return Err(Error::InvalidInput(format!(
                "{} records have no tags",
                T::KIND
            )));
        }
        let table = T::KIND.table();
        let sql = format!(
            "SELECT data FROM {table}
             WHERE user_id = ?1 AND is_deleted = 0
               AND EXISTS (SELECT 1 FROM json_each({table}.data, '$.tags') WHERE json_each.value = ?2)
             ORDER BY updated_at DESC"
        );
        self.query(sql, vec![user_id.to_string(), tag.to_string()])
            .await
    }

    /// List a user's live todos with the given status
    pub async fn list_todos_by_status(&self, user_id: &str, status: TodoStatus) -> Result<Vec<Todo>> {
        self.query(
            "SELECT data FROM todos
             WHERE user_id = ?1 AND is_deleted = 0 AND json_extract(data, '$.status') = ?2
             ORDER BY json_extract(data, '$.sort_order') ASC, updated_at DESC"
                .to_string(),
            vec![user_id.to_string(), status.as_str().to_string()],
        )
        .await
    }

    /// List a user's live notes inside a folder
    pub async fn list_notes_in_folder(&self, user_id: &str, folder_id: &str) -> Result<Vec<Note>> {
        self.query(
            "SELECT data FROM notes
             WHERE user_id = ?1 AND is_deleted = 0 AND json_extract(data, '$.folder_id') = ?2
             ORDER BY updated_at DESC"
                .to_string(),
            vec![user_id.to_string(), folder_id.to_string()],
        )
        .await
    }

    /// List a user's live events overlapping `[start, end)`, earliest first
    pub async fn list_events_between(
        &self,
        user_id: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<CalendarEvent>> {
        self.query(
            "SELECT data FROM calendar_events
             WHERE user_id = ?1 AND is_deleted = 0
               AND json_extract(data, '$.start_at') < ?3
               AND json_extract(data, '$.end_at') > ?2
             ORDER BY json_extract(data, '$.start_at') ASC"
                .to_string(),
            vec![user_id.to_string(), start.to_string(), end.to_string()],
        )
        .await
    }

    /// List attachments hanging off one parent record, oldest first
    pub async fn list_attachments_for(
        &self,
        parent_type: ParentType,
        parent_id: &str,
    ) -> Result<Vec<Attachment>> {
        self.query(
            "SELECT data FROM attachments
             WHERE json_extract(data, '$.parent_type') = ?1
               AND json_extract(data, '$.parent_id') = ?2
             ORDER BY created_at ASC"
                .to_string(),
            vec![parent_type.as_str().to_string(), parent_id.to_string()],
        )
        .await
    }

    async fn query<T: Entity>(&self, sql: String, args: Vec<String>) -> Result<Vec<T>> {
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(rusqlite::params_from_iter(args.iter()), parse_data)?
                    .collect::<rusqlite::Result<Vec<Value>>>()?;
                rows.into_iter()
                    .map(|value| serde_json::from_value(value).map_err(Into::into))
                    .collect()
            })
            .await
    }
}

fn parse_data(row: &Row<'_>) -> rusqlite::Result<Value> {
    row.get(0)
}

fn get_row(conn: &Connection, kind: EntityKind, id: &str) -> Result<Option<Value>> {
    let sql = format!("SELECT data FROM {} WHERE id = ?1", kind.table());
    Ok(conn.query_row(&sql, params![id], parse_data).optional()?)
}

fn put_row(conn: &Connection, kind: EntityKind, record: &Value) -> Result<()> {
    let keys = RowKeys::from_record(kind, record)?;
    let sql = format!(
        "INSERT INTO {} (id, user_id, is_deleted, created_at, updated_at, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
             user_id = excluded.user_id,
             is_deleted = excluded.is_deleted,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at,
             data = excluded.data",
        kind.table()
    );
    conn.execute(
        &sql,
        params![
            keys.id,
            keys.user_id,
            i32::from(keys.is_deleted),
            keys.created_at,
            keys.updated_at,
            record,
        ],
    )?;
    Ok(())
}
