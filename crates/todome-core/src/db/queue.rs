//! Durable, ordered log of local writes awaiting remote confirmation

use rusqlite::{params, Row};
use serde_json::Value;

use super::connection::storage_error;
use super::Database;
use crate::error::{Error, Result};
use crate::models::{EntityKind, Operation, QueueEntry};
use crate::util::now_iso;

/// The mutation queue.
///
/// Entries are strictly ordered by `sequence`. `AUTOINCREMENT` guarantees a
/// sequence is never reused, even after the newest entry is removed.
#[derive(Clone, Debug)]
pub struct MutationQueue {
    db: Database,
}

impl MutationQueue {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append an entry and return its sequence number.
    pub async fn enqueue(
        &self,
        table: EntityKind,
        record_id: &str,
        operation: Operation,
        payload: &Value,
    ) -> Result<i64> {
        if !payload.is_object() {
            return Err(Error::InvalidInput(
                "Queue payload must be a JSON object".to_string(),
            ));
        }

        let record_id = record_id.to_string();
        let payload = payload.clone();
        let sequence = self
            .db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sync_queue (table_name, record_id, operation, payload, enqueued_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        table.table(),
                        record_id,
                        operation.as_str(),
                        payload,
                        now_iso()
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        tracing::debug!("Queued {operation} for {table} (sequence {sequence})");
        Ok(sequence)
    }

    /// All pending entries in ascending sequence order.
    pub async fn drain(&self) -> Result<Vec<QueueEntry>> {
        self.db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT sequence, table_name, record_id, operation, payload, enqueued_at
                     FROM sync_queue
                     ORDER BY sequence ASC",
                )?;
                let raw = stmt
                    .query_map([], RawEntry::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                raw.into_iter().map(RawEntry::into_entry).collect()
            })
            .await
    }

    /// Delete one entry once the remote has confirmed it.
    ///
    /// Returns whether the entry was still present.
    pub async fn remove(&self, sequence: i64) -> Result<bool> {
        self.db
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM sync_queue WHERE sequence = ?1", [sequence])? > 0)
            })
            .await
    }

    /// Number of pending entries
    pub async fn len(&self) -> Result<usize> {
        self.db
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
                usize::try_from(count).map_err(|e| storage_error("Invalid queue length", e))
            })
            .await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Pending entries for one record, oldest first
    pub async fn pending_for(&self, table: EntityKind, record_id: &str) -> Result<Vec<QueueEntry>> {
        let record_id = record_id.to_string();
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT sequence, table_name, record_id, operation, payload, enqueued_at
                     FROM sync_queue
                     WHERE table_name = ?1 AND record_id = ?2
                     ORDER BY sequence ASC",
                )?;
                let raw = stmt
                    .query_map(params![table.table(), record_id], RawEntry::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                raw.into_iter().map(RawEntry::into_entry).collect()
            })
            .await
    }
}

/// Row as stored, before the text columns are parsed into enums.
struct RawEntry {
    sequence: i64,
    table: String,
    record_id: String,
    operation: String,
    payload: Value,
    enqueued_at: String,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sequence: row.get(0)?,
            table: row.get(1)?,
            record_id: row.get(2)?,
            operation: row.get(3)?,
            payload: row.get(4)?,
            enqueued_at: row.get(5)?,
        })
    }

    fn into_entry(self) -> Result<QueueEntry> {
        Ok(QueueEntry {
            sequence: self.sequence,
            table: self.table.parse()?,
            record_id: self.record_id,
            operation: self.operation.parse()?,
            payload: self.payload,
            enqueued_at: self.enqueued_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn setup() -> MutationQueue {
        MutationQueue::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_enqueue_assigns_increasing_sequences() {
        let queue = setup();
        let a = queue
            .enqueue(EntityKind::Todo, "t1", Operation::Create, &json!({"id": "t1"}))
            .await
            .unwrap();
        let b = queue
            .enqueue(EntityKind::Todo, "t1", Operation::Update, &json!({"title": "x"}))
            .await
            .unwrap();
        assert!(b > a);
        assert_eq!(queue.len().await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_drain_returns_insertion_order() {
        let queue = setup();
        queue
            .enqueue(EntityKind::Note, "n1", Operation::Create, &json!({"id": "n1"}))
            .await
            .unwrap();
        queue
            .enqueue(EntityKind::Folder, "f1", Operation::Create, &json!({"id": "f1"}))
            .await
            .unwrap();
        queue
            .enqueue(EntityKind::Note, "n1", Operation::Delete, &json!({"is_deleted": true}))
            .await
            .unwrap();

        let entries = queue.drain().await.unwrap();
        let summary: Vec<_> = entries
            .iter()
            .map(|e| (e.table, e.record_id.as_str(), e.operation))
            .collect();
        assert_eq!(
            summary,
            vec![
                (EntityKind::Note, "n1", Operation::Create),
                (EntityKind::Folder, "f1", Operation::Create),
                (EntityKind::Note, "n1", Operation::Delete),
            ]
        );
        assert_eq!(entries[2].payload, json!({"is_deleted": true}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_single_entry() {
        let queue = setup();
        let first = queue
            .enqueue(EntityKind::Todo, "t1", Operation::Create, &json!({"id": "t1"}))
            .await
            .unwrap();
        queue
            .enqueue(EntityKind::Todo, "t2", Operation::Create, &json!({"id": "t2"}))
            .await
            .unwrap();

        assert!(queue.remove(first).await.unwrap());
        assert!(!queue.remove(first).await.unwrap());

        let remaining = queue.drain().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].record_id, "t2");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sequence_not_reused_after_removal() {
        let queue = setup();
        let first = queue
            .enqueue(EntityKind::Todo, "t1", Operation::Create, &json!({"id": "t1"}))
            .await
            .unwrap();
        queue.remove(first).await.unwrap();

        let second = queue
            .enqueue(EntityKind::Todo, "t2", Operation::Create, &json!({"id": "t2"}))
            .await
            .unwrap();
        assert!(second > first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pending_for_filters_by_record() {
        let queue = setup();
        queue
            .enqueue(EntityKind::Todo, "t1", Operation::Create, &json!({"id": "t1"}))
            .await
            .unwrap();
        queue
            .enqueue(EntityKind::Note, "t1", Operation::Create, &json!({"id": "t1"}))
            .await
            .unwrap();

        let pending = queue.pending_for(EntityKind::Todo, "t1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].table, EntityKind::Todo);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rejects_non_object_payload() {
        let queue = setup();
        let result = queue
            .enqueue(EntityKind::Todo, "t1", Operation::Update, &json!([1, 2]))
            .await;
        assert!(result.is_err());
        assert!(queue.is_empty().await.unwrap());
    }
}
