//! In-process remote backend

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::Semaphore;

use super::{RemoteClient, RemoteError, RemoteResult};
use crate::models::EntityKind;
use crate::util::compare_timestamps;

/// A call the remote received, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Fetch {
        kind: EntityKind,
        since: Option<String>,
    },
    Insert {
        kind: EntityKind,
        record: Value,
    },
    Update {
        kind: EntityKind,
        id: String,
        patch: Value,
    },
}

impl RemoteCall {
    pub const fn is_write(&self) -> bool {
        !matches!(self, Self::Fetch { .. })
    }
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<EntityKind, BTreeMap<String, Value>>,
    calls: Vec<RemoteCall>,
    /// Writes allowed before `write_failure` kicks in
    writes_before_failure: Option<usize>,
    write_failure: Option<RemoteError>,
    fetch_failures: HashMap<EntityKind, RemoteError>,
    gate: Option<Arc<Semaphore>>,
}

/// Remote backend held in memory.
///
/// Behaves like a row store with a unique `id` per table: inserting an
/// existing id is rejected, updates merge patch keys into the row. Every call
/// is recorded, failures can be injected, and calls can be held behind a
/// gate. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock only happens inside a failing test
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Put rows straight into a table without recording a call
    pub fn seed(&self, kind: EntityKind, rows: impl IntoIterator<Item = Value>) {
        let mut state = self.lock();
        let table = state.tables.entry(kind).or_default();
        for row in rows {
            if let Some(id) = row.get("id").and_then(Value::as_str) {
                table.insert(id.to_string(), row);
            }
        }
    }

    /// Current remote version of a row
    pub fn row(&self, kind: EntityKind, id: &str) -> Option<Value> {
        self.lock()
            .tables
            .get(&kind)
            .and_then(|table| table.get(id))
            .cloned()
    }

    /// Number of rows held for `kind`
    pub fn row_count(&self, kind: EntityKind) -> usize {
        self.lock().tables.get(&kind).map_or(0, BTreeMap::len)
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Insert and update calls received so far
    pub fn write_calls(&self) -> Vec<RemoteCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Let `successes` more writes through, then fail every write with `error`
    pub fn fail_writes_after(&self, successes: usize, error: RemoteError) {
        let mut state = self.lock();
        state.writes_before_failure = Some(successes);
        state.write_failure = Some(error);
    }

    /// Fail every fetch of `kind` with `error`
    pub fn fail_fetch(&self, kind: EntityKind, error: RemoteError) {
        self.lock().fetch_failures.insert(kind, error);
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.writes_before_failure = None;
        state.write_failure = None;
        state.fetch_failures.clear();
    }

    /// Hold every call until `gate` has a permit available
    pub fn set_gate(&self, gate: Arc<Semaphore>) {
        self.lock().gate = Some(gate);
    }

    async fn pass_gate(&self) {
        let gate = self.lock().gate.clone();
        if let Some(gate) = gate {
            // A closed gate lets everything through
            let _permit = gate.acquire().await;
        }
    }

    fn check_write_failure(state: &mut State) -> RemoteResult<()> {
        match state.writes_before_failure {
            Some(0) => Err(state
                .write_failure
                .clone()
                .unwrap_or_else(|| RemoteError::Transport("injected failure".to_string()))),
            Some(remaining) => {
                state.writes_before_failure = Some(remaining - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl RemoteClient for MemoryRemote {
    async fn fetch_since(&self, kind: EntityKind, since: Option<&str>) -> RemoteResult<Vec<Value>> {
        self.pass_gate().await;
        let mut state = self.lock();
        state.calls.push(RemoteCall::Fetch {
            kind,
            since: since.map(str::to_string),
        });
        if let Some(error) = state.fetch_failures.get(&kind) {
            return Err(error.clone());
        }

        let column = kind.policy().cursor_column;
        let cursor_of = |row: &Value| {
            row.get(column)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let mut rows: Vec<Value> = state
            .tables
            .get(&kind)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default();
        if let Some(since) = since {
            rows.retain(|row| compare_timestamps(&cursor_of(row), since) == Ordering::Greater);
        }
        rows.sort_by(|a, b| compare_timestamps(&cursor_of(a), &cursor_of(b)));
        Ok(rows)
    }

    async fn insert(&self, kind: EntityKind, record: &Value) -> RemoteResult<()> {
        self.pass_gate().await;
        let mut state = self.lock();
        state.calls.push(RemoteCall::Insert {
            kind,
            record: record.clone(),
        });
        Self::check_write_failure(&mut state)?;

        let id = record
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::Rejected {
                status: 400,
                message: "null value in column \"id\"".to_string(),
            })?
            .to_string();
        // Same as an ignore-duplicates upsert: the stored row wins
        state
            .tables
            .entry(kind)
            .or_default()
            .entry(id)
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn update_partial(&self, kind: EntityKind, id: &str, patch: &Value) -> RemoteResult<()> {
        self.pass_gate().await;
        let mut state = self.lock();
        state.calls.push(RemoteCall::Update {
            kind,
            id: id.to_string(),
            patch: patch.clone(),
        });
        Self::check_write_failure(&mut state)?;

        // Like a filtered PATCH, a missing row is not an error
        let row = state
            .tables
            .get_mut(&kind)
            .and_then(|table| table.get_mut(id))
            .and_then(Value::as_object_mut);
        if let (Some(row), Some(patch)) = (row, patch.as_object()) {
            for (key, value) in patch {
                row.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}
