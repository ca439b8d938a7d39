//! Repository façade: the only write path for application data
//!
//! Every mutation is applied to the local store first and then recorded in
//! the mutation queue, so it survives restarts and reaches the remote on a
//! later push even if the device is offline now.

use serde_json::{Map, Value};

use crate::db::{CursorStore, LocalStore, SqliteCursorStore};
use crate::error::{Error, Result};
use crate::models::{Entity, Operation};
use crate::remote::RemoteClient;
use crate::sync::SyncEngine;
use crate::util::{compare_timestamps, now_iso};

/// Local-first access to every entity kind
pub struct Repository<R, C = SqliteCursorStore> {
    engine: SyncEngine<R, C>,
}

impl<R, C> Clone for Repository<R, C> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<R, C> Repository<R, C>
where
    R: RemoteClient,
    C: CursorStore,
{
    pub const fn new(engine: SyncEngine<R, C>) -> Self {
        Self { engine }
    }

    pub const fn engine(&self) -> &SyncEngine<R, C> {
        &self.engine
    }

    pub fn store(&self) -> &LocalStore {
        self.engine.store()
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Store a new record and queue it for insertion remotely.
    pub async fn create<T: Entity>(&self, record: &T) -> Result<()> {
        let payload = serde_json::to_value(record)?;
        self.store().put_raw(T::KIND, &payload).await?;
        self.engine
            .queue()
            .enqueue(T::KIND, record.id(), Operation::Create, &payload)
            .await?;

        tracing::debug!("Created {}/{}", T::KIND, record.id());
        self.engine.request_push();
        Ok(())
    }

    /// Apply `patch` over `current` locally and queue only the patch.
    ///
    /// For kinds that track `updated_at`, the patch is stamped with a value
    /// no older than the current record's. Returns the merged record.
    pub async fn update<T: Entity>(&self, id: &str, patch: &Value, current: &T) -> Result<T> {
        if current.id() != id {
            return Err(Error::InvalidInput(format!(
                "Update for {id} was given {} {}",
                T::KIND,
                current.id()
            )));
        }
        let Some(patch_fields) = patch.as_object() else {
            return Err(Error::InvalidInput("Patch must be a JSON object".to_string()));
        };
        if patch_fields
            .get("id")
            .is_some_and(|patched| patched.as_str() != Some(id))
        {
            return Err(Error::InvalidInput(format!(
                "{} id is immutable",
                T::KIND
            )));
        }

        let mut merged = serde_json::to_value(current)?;
        let mut patch = patch_fields.clone();
        if T::KIND.policy().has_updated_at {
            let stamp = next_updated_at(
                merged.get("updated_at").and_then(Value::as_str),
                patch.get("updated_at").and_then(Value::as_str),
            );
            patch.insert("updated_at".to_string(), Value::String(stamp));
        }
        merge_into(&mut merged, &patch)?;

        // Type-checks the patched fields before anything is written
        let updated: T = serde_json::from_value(merged.clone())?;

        self.store().put_raw(T::KIND, &merged).await?;
        self.engine
            .queue()
            .enqueue(T::KIND, id, Operation::Update, &Value::Object(patch))
            .await?;

        tracing::debug!("Updated {}/{id}", T::KIND);
        self.engine.request_push();
        Ok(updated)
    }

    /// Delete a record.
    ///
    /// Kinds with a tombstone keep the row locally with `is_deleted` set;
    /// other kinds are removed from the local store. Either way the remote
    /// row is soft-deleted on push, with a fresh `updated_at` where the kind
    /// has one.
    pub async fn delete<T: Entity>(&self, id: &str, current: &T) -> Result<()> {
        if current.id() != id {
            return Err(Error::InvalidInput(format!(
                "Delete for {id} was given {} {}",
                T::KIND,
                current.id()
            )));
        }

        let policy = T::KIND.policy();
        let mut record = serde_json::to_value(current)?;
        let mut fields = Map::new();
        fields.insert("is_deleted".to_string(), Value::Bool(true));
        if policy.has_updated_at {
            // The remote cursor column has to move with the tombstone
            let stamp = next_updated_at(record.get("updated_at").and_then(Value::as_str), None);
            fields.insert("updated_at".to_string(), Value::String(stamp));
        }

        if policy.supports_tombstone {
            merge_into(&mut record, &fields)?;
            self.store().put_raw(T::KIND, &record).await?;
        } else if !self.store().delete(T::KIND, id).await? {
            tracing::debug!("{}/{id} was already gone locally", T::KIND);
        }

        self.engine
            .queue()
            .enqueue(T::KIND, id, Operation::Delete, &Value::Object(fields))
            .await?;

        tracing::debug!("Deleted {}/{id}", T::KIND);
        self.engine.request_push();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Local lookup by id, tombstones included
    pub async fn get<T: Entity>(&self, id: &str) -> Result<Option<T>> {
        self.store().get(id).await
    }

    /// Like [`get`](Self::get) but missing records are an error
    pub async fn require<T: Entity>(&self, id: &str) -> Result<T> {
        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} {id}", T::KIND)))
    }

    /// A user's live records from the local store
    pub async fn list_by_owner<T: Entity>(&self, user_id: &str) -> Result<Vec<T>> {
        self.store().list_by_owner(user_id).await
    }

    /// Refresh `T` from the remote when online, then read locally.
    ///
    /// A failed refresh is not an error: the local copy is served instead.
    pub async fn load<T: Entity>(&self, user_id: &str) -> Result<Vec<T>> {
        if self.engine.is_online() {
            if let Err(error) = self.engine.pull_kind(T::KIND).await {
                tracing::debug!("Serving {} from local store: {error}", T::KIND);
            }
        }
        self.list_by_owner(user_id).await
    }
}

/// Stamp for a write: the requested time (or now), but never earlier than
/// the record's previous `updated_at`.
fn next_updated_at(previous: Option<&str>, requested: Option<&str>) -> String {
    let candidate = requested.map_or_else(now_iso, str::to_string);
    match previous {
        Some(previous) if compare_timestamps(&candidate, previous).is_lt() => previous.to_string(),
        _ => candidate,
    }
}

fn merge_into(record: &mut Value, fields: &Map<String, Value>) -> Result<()> {
    let Some(object) = record.as_object_mut() else {
        return Err(Error::InvalidInput(
            "Record must serialize to a JSON object".to_string(),
        ));
    };
    for (key, value) in fields {
        object.insert(key.clone(), value.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::{Database, MemoryCursorStore, MutationQueue};
    use crate::models::{EntityKind, Folder, Note, Todo, TodoStatus};
    use crate::remote::{MemoryRemote, RemoteCall};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    type TestRepository = Repository<MemoryRemote, MemoryCursorStore>;

    fn setup(online: bool) -> (TestRepository, MemoryRemote) {
        let (repo, remote, _db) = setup_with_db(online);
        (repo, remote)
    }

    fn setup_with_db(online: bool) -> (TestRepository, MemoryRemote, Database) {
        let db = Database::open_in_memory().unwrap();
        let remote = MemoryRemote::new();
        let engine = SyncEngine::new(
            LocalStore::new(db.clone()),
            MutationQueue::new(db.clone()),
            remote.clone(),
            MemoryCursorStore::new(),
            online,
        );
        (Repository::new(engine), remote, db)
    }

    async fn wait_for_empty_queue(repo: &TestRepository) {
        for _ in 0..200 {
            if repo.engine().queue().is_empty().await.unwrap() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("queue never drained");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_offline_create_then_sync() {
        let (repo, remote) = setup(false);
        let todo = Todo::new("u1", "Write report").unwrap();
        assert_eq!(todo.status, TodoStatus::Pending);

        repo.create(&todo).await.unwrap();

        let entries = repo.engine().queue().drain().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, Operation::Create);
        assert_eq!(entries[0].record_id, todo.id);
        assert_eq!(repo.get::<Todo>(&todo.id).await.unwrap(), Some(todo.clone()));
        assert!(remote.calls().is_empty());

        repo.engine().set_online(true);
        let report = repo.engine().sync().await.unwrap();
        assert_eq!(report.pushed, 1);

        assert_eq!(
            remote.write_calls(),
            vec![RemoteCall::Insert {
                kind: EntityKind::Todo,
                record: serde_json::to_value(&todo).unwrap(),
            }]
        );
        assert!(repo.engine().queue().is_empty().await.unwrap());
        assert!(!repo.engine().is_syncing());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_online_create_pushes_in_background() {
        let (repo, remote) = setup(true);
        let note = Note::new("u1", "Groceries");

        repo.create(&note).await.unwrap();
        wait_for_empty_queue(&repo).await;

        assert_eq!(remote.row(EntityKind::Note, &note.id).unwrap()["title"], "Groceries");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_queues_patch_only() {
        let (repo, _remote) = setup(false);
        let todo = Todo::new("u1", "Draft").unwrap();
        repo.create(&todo).await.unwrap();

        let updated = repo
            .update(&todo.id, &json!({"status": "completed"}), &todo)
            .await
            .unwrap();
        assert_eq!(updated.status, TodoStatus::Completed);
        assert_eq!(updated.title, "Draft");

        let stored: Todo = repo.require(&todo.id).await.unwrap();
        assert_eq!(stored, updated);

        let entries = repo.engine().queue().drain().await.unwrap();
        assert_eq!(entries.len(), 2);
        let patch = entries[1].payload.as_object().unwrap();
        assert_eq!(entries[1].operation, Operation::Update);
        assert_eq!(patch.len(), 2);
        assert_eq!(patch["status"], "completed");
        assert_eq!(patch["updated_at"], json!(updated.updated_at));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_never_moves_updated_at_backwards() {
        let (repo, _remote) = setup(false);
        let mut note = Note::new("u1", "Future");
        note.updated_at = "2999-01-01T00:00:00.000Z".to_string();
        repo.create(&note).await.unwrap();

        let updated = repo
            .update(&note.id, &json!({"title": "Still future"}), &note)
            .await
            .unwrap();
        assert_eq!(updated.updated_at, "2999-01-01T00:00:00.000Z");

        let older = repo
            .update(
                &note.id,
                &json!({"updated_at": "2000-01-01T00:00:00.000Z"}),
                &updated,
            )
            .await
            .unwrap();
        assert_eq!(older.updated_at, "2999-01-01T00:00:00.000Z");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_rejects_bad_patch_without_side_effects() {
        let (repo, _remote) = setup(false);
        let todo = Todo::new("u1", "Typed").unwrap();
        repo.create(&todo).await.unwrap();

        let wrong_type = repo
            .update(&todo.id, &json!({"priority": "urgent"}), &todo)
            .await;
        assert!(matches!(wrong_type, Err(Error::Serialization(_))));

        let new_id = repo.update(&todo.id, &json!({"id": "other"}), &todo).await;
        assert!(matches!(new_id, Err(Error::InvalidInput(_))));

        let not_object = repo.update(&todo.id, &json!(["status"]), &todo).await;
        assert!(matches!(not_object, Err(Error::InvalidInput(_))));

        let mismatched = repo.update("other", &json!({}), &todo).await;
        assert!(matches!(mismatched, Err(Error::InvalidInput(_))));

        assert_eq!(repo.engine().queue().len().await.unwrap(), 1);
        assert_eq!(repo.get::<Todo>(&todo.id).await.unwrap(), Some(todo));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_writes_tombstone() {
        let (repo, _remote) = setup(false);
        let note = Note::new("u1", "Old");
        repo.create(&note).await.unwrap();

        repo.delete(&note.id, &note).await.unwrap();

        let stored: Note = repo.require(&note.id).await.unwrap();
        assert!(stored.is_deleted);
        assert!(compare_timestamps(&stored.updated_at, &note.updated_at).is_ge());
        assert!(repo.list_by_owner::<Note>("u1").await.unwrap().is_empty());

        let entries = repo.engine().queue().drain().await.unwrap();
        assert_eq!(entries[1].operation, Operation::Delete);
        assert_eq!(
            entries[1].payload,
            json!({"is_deleted": true, "updated_at": stored.updated_at})
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remote_tombstone_reaches_incremental_pull() {
        let (repo, remote) = setup(true);
        let mut note = Note::new("u1", "Shared");
        note.updated_at = "2024-01-01T00:00:00.000Z".to_string();
        repo.create(&note).await.unwrap();
        wait_for_empty_queue(&repo).await;

        repo.delete(&note.id, &note).await.unwrap();
        wait_for_empty_queue(&repo).await;

        // Another device that already pulled the live row
        let rows = remote
            .fetch_since(EntityKind::Note, Some(&note.updated_at))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["is_deleted"], true);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_folder_removes_local_row() {
        let (repo, remote) = setup(false);
        let folder = Folder::new("u1", "Work");
        repo.create(&folder).await.unwrap();

        repo.delete(&folder.id, &folder).await.unwrap();
        assert_eq!(repo.get::<Folder>(&folder.id).await.unwrap(), None);
        assert_eq!(repo.engine().queue().len().await.unwrap(), 2);

        repo.engine().set_online(true);
        repo.engine().push_changes().await.unwrap();
        let Some(RemoteCall::Update { kind, id, patch }) = remote.write_calls().pop() else {
            panic!("expected a soft delete update");
        };
        assert_eq!(kind, EntityKind::Folder);
        assert_eq!(id, folder.id);
        assert_eq!(patch["is_deleted"], true);
        assert!(compare_timestamps(patch["updated_at"].as_str().unwrap(), &folder.updated_at).is_ge());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_local_write_is_not_queued() {
        let (repo, _remote) = setup(false);
        let mut todo = Todo::new("u1", "No id").unwrap();
        todo.id = String::new();

        assert!(repo.create(&todo).await.is_err());
        assert!(repo.engine().queue().is_empty().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_enqueue_keeps_local_write_and_reports_error() {
        let (repo, _remote, db) = setup_with_db(false);
        db.call(|conn| {
            conn.execute_batch("DROP TABLE sync_queue")?;
            Ok(())
        })
        .await
        .unwrap();

        let todo = Todo::new("u1", "Unqueued").unwrap();
        let result = repo.create(&todo).await;

        assert!(matches!(result, Err(Error::Sqlite(_))));
        assert_eq!(repo.get::<Todo>(&todo.id).await.unwrap(), Some(todo));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_refreshes_when_online() {
        let (repo, remote) = setup(true);
        let mut remote_note = Note::new("u1", "From server");
        remote_note.updated_at = "2024-01-01T00:00:00.000Z".to_string();
        remote.seed(EntityKind::Note, [serde_json::to_value(&remote_note).unwrap()]);

        let notes: Vec<Note> = repo.load("u1").await.unwrap();
        assert_eq!(notes, vec![remote_note.clone()]);

        // Offline the cached copy is still served
        repo.engine().set_online(false);
        let cached: Vec<Note> = repo.load("u1").await.unwrap();
        assert_eq!(cached, vec![remote_note]);
    }

    #[test]
    fn test_next_updated_at() {
        let t0 = "2024-01-01T00:00:00.000Z";
        let t1 = "2024-01-02T00:00:00.000Z";
        assert_eq!(next_updated_at(Some(t0), Some(t1)), t1);
        assert_eq!(next_updated_at(Some(t1), Some(t0)), t1);
        assert_eq!(next_updated_at(None, Some(t0)), t0);
        assert!(compare_timestamps(&next_updated_at(Some(t0), None), t0).is_gt());
    }
}
