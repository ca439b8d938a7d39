//! Sync engine: pushes the mutation queue and pulls remote changes

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::conflict::{resolve, Resolution};
use crate::db::{CursorStore, LocalStore, MutationQueue, SqliteCursorStore};
use crate::error::{Error, Result};
use crate::models::{EntityKind, Operation, QueueEntry};
use crate::remote::{RemoteClient, RemoteResult};
use crate::state::SyncStatus;
use crate::util::{compare_timestamps, now_iso};

/// Aggregate outcome of one [`SyncEngine::sync`] cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Queue entries confirmed by the remote
    pub pushed: usize,
    /// Remote rows written into the local store
    pub pulled: usize,
    /// Why the push stopped early, if it did
    pub push_error: Option<String>,
    /// Kinds whose pull failed, with the reason
    pub pull_failures: Vec<(EntityKind, String)>,
}

impl SyncReport {
    /// Whether every step of the cycle succeeded
    pub fn is_clean(&self) -> bool {
        self.push_error.is_none() && self.pull_failures.is_empty()
    }

    fn summary_error(&self) -> Option<String> {
        if let Some(error) = &self.push_error {
            return Some(error.clone());
        }
        self.pull_failures
            .first()
            .map(|(kind, error)| format!("pull {kind}: {error}"))
    }
}

struct Inner<R, C> {
    store: LocalStore,
    queue: MutationQueue,
    remote: R,
    cursors: C,
    online: AtomicBool,
    syncing: AtomicBool,
    /// Held for the whole of a queue drain
    push_lock: Mutex<()>,
    /// Set while an opportunistic push task exists
    push_spawned: AtomicBool,
    status: watch::Sender<SyncStatus>,
    shutdown: watch::Sender<bool>,
}

/// Reconciles the local store with the remote store.
///
/// One engine is built per process from injected handles and shared by
/// cloning. Connectivity is pushed in by the host through
/// [`set_online`](Self::set_online); it only gates what push and pull may
/// attempt and never starts a sync by itself.
pub struct SyncEngine<R, C = SqliteCursorStore> {
    inner: Arc<Inner<R, C>>,
}

impl<R, C> Clone for SyncEngine<R, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Clears the syncing flag when a cycle ends, however it ends.
struct SyncingGuard<'a> {
    flag: &'a AtomicBool,
    status: &'a watch::Sender<SyncStatus>,
}

impl<'a> SyncingGuard<'a> {
    fn acquire(flag: &'a AtomicBool, status: &'a watch::Sender<SyncStatus>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::SyncInProgress)?;
        status.send_modify(|status| status.is_syncing = true);
        Ok(Self { flag, status })
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.status.send_modify(|status| status.is_syncing = false);
    }
}

impl<R, C> SyncEngine<R, C>
where
    R: RemoteClient,
    C: CursorStore,
{
    /// Build an engine. `online` is the host's connectivity at startup.
    pub fn new(store: LocalStore, queue: MutationQueue, remote: R, cursors: C, online: bool) -> Self {
        let (status, _) = watch::channel(SyncStatus {
            is_online: online,
            ..SyncStatus::default()
        });
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(Inner {
                store,
                queue,
                remote,
                cursors,
                online: AtomicBool::new(online),
                syncing: AtomicBool::new(false),
                push_lock: Mutex::new(()),
                push_spawned: AtomicBool::new(false),
                status,
                shutdown,
            }),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.inner.queue
    }

    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    pub fn cursors(&self) -> &C {
        &self.inner.cursors
    }

    // -----------------------------------------------------------------------
    // Observable state
    // -----------------------------------------------------------------------

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::Acquire)
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::Acquire)
    }

    /// Current status snapshot
    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    /// Receiver notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    /// Record a connectivity change reported by the host.
    pub fn set_online(&self, online: bool) {
        let was_online = self.inner.online.swap(online, Ordering::AcqRel);
        if was_online != online {
            tracing::info!("Connectivity changed: {}", if online { "online" } else { "offline" });
            self.inner
                .status
                .send_modify(|status| status.is_online = online);
        }
    }

    /// Number of queued changes not yet confirmed remotely
    pub async fn pending_changes(&self) -> Result<usize> {
        self.inner.queue.len().await
    }

    async fn refresh_pending(&self) {
        let pending = match self.inner.queue.len().await {
            Ok(pending) => pending,
            Err(error) => {
                tracing::warn!("Failed to read mutation queue length: {error}");
                return;
            }
        };
        self.inner.status.send_if_modified(|status| {
            let changed = status.pending != pending;
            status.pending = pending;
            changed
        });
    }

    fn record_error(&self, error: Option<String>) {
        self.inner.status.send_if_modified(|status| {
            let changed = status.last_error != error;
            status.last_error = error;
            changed
        });
    }

    // -----------------------------------------------------------------------
    // Push
    // -----------------------------------------------------------------------

    /// Drain the mutation queue to the remote, in sequence order.
    ///
    /// Stops at the first failing entry; it and everything after it stay
    /// queued and the next push resumes from it. If another push is already
    /// draining, returns `Ok(0)` without touching the remote.
    pub async fn push_changes(&self) -> Result<usize> {
        if !self.is_online() {
            return Err(Error::Offline);
        }

        let Ok(_drain) = self.inner.push_lock.try_lock() else {
            tracing::debug!("Push already draining; skipping");
            return Ok(0);
        };

        self.drain_and_report().await
    }

    /// Like [`push_changes`](Self::push_changes) but waits for a running
    /// drain to finish instead of skipping.
    async fn push_when_free(&self) -> Result<usize> {
        if !self.is_online() {
            return Err(Error::Offline);
        }
        let _drain = self.inner.push_lock.lock().await;
        self.drain_and_report().await
    }

    /// Caller must hold `push_lock`.
    async fn drain_and_report(&self) -> Result<usize> {
        let result = self.drain_queue().await;
        self.after_push(&result).await;
        result
    }

    async fn after_push(&self, result: &Result<usize>) {
        match result {
            Ok(0) => {}
            Ok(pushed) => tracing::info!("Pushed {pushed} change(s)"),
            Err(error) => tracing::warn!("Push failed: {error}"),
        }
        match result {
            Ok(_) => self.record_error(None),
            Err(error) if !error.is_connectivity() => self.record_error(Some(error.to_string())),
            Err(_) => {}
        }
        self.refresh_pending().await;
    }

    /// Caller must hold `push_lock`.
    async fn drain_queue(&self) -> Result<usize> {
        let mut pushed = 0;

        // Entries queued while draining are picked up by the next pass
        loop {
            let entries = self.inner.queue.drain().await?;
            if entries.is_empty() {
                return Ok(pushed);
            }

            for entry in entries {
                if let Err(source) = self.push_single(&entry).await {
                    tracing::warn!(
                        "Remote refused {} of {}/{} (sequence {}): {source}",
                        entry.operation,
                        entry.table,
                        entry.record_id,
                        entry.sequence
                    );
                    return Err(Error::PushHalted {
                        pushed,
                        sequence: entry.sequence,
                        source,
                    });
                }

                self.inner.queue.remove(entry.sequence).await?;
                pushed += 1;
                tracing::debug!(
                    "Pushed {} {}/{} (sequence {})",
                    entry.operation,
                    entry.table,
                    entry.record_id,
                    entry.sequence
                );
            }
        }
    }

    async fn push_single(&self, entry: &QueueEntry) -> RemoteResult<()> {
        let remote = &self.inner.remote;
        match entry.operation {
            Operation::Create => remote.insert(entry.table, &entry.payload).await,
            Operation::Update => {
                remote
                    .update_partial(entry.table, &entry.record_id, &entry.payload)
                    .await
            }
            Operation::Delete => {
                remote
                    .soft_delete(entry.table, &entry.record_id, &entry.payload)
                    .await
            }
        }
    }

    /// Start a push in the background without waiting for it.
    ///
    /// At most one such task exists at a time; further requests while it runs
    /// are dropped because its drain loop also picks up their entries. The
    /// task waits for a drain already in progress rather than skipping.
    /// Failures are only logged: the queue keeps the entries for a later
    /// attempt. Returns the task handle when one was started.
    pub fn request_push(&self) -> Option<JoinHandle<()>> {
        if !self.is_online() {
            return None;
        }
        if self.inner.push_spawned.swap(true, Ordering::AcqRel) {
            tracing::debug!("Opportunistic push already in flight");
            return None;
        }

        let engine = self.clone();
        Some(tokio::spawn(async move {
            loop {
                let result = engine.push_when_free().await;
                engine.inner.push_spawned.store(false, Ordering::Release);
                if let Err(error) = result {
                    tracing::debug!("Opportunistic push did not complete: {error}");
                    return;
                }
                if !engine.claim_leftover_push().await {
                    return;
                }
            }
        }))
    }

    /// Entries queued after the drain ended but before the in-flight flag was
    /// cleared lost their request. Claims the flag for another pass when such
    /// entries exist and no newer task has taken over.
    async fn claim_leftover_push(&self) -> bool {
        let pending = self.inner.queue.is_empty().await.is_ok_and(|empty| !empty);
        pending && self.is_online() && !self.inner.push_spawned.swap(true, Ordering::AcqRel)
    }

    // -----------------------------------------------------------------------
    // Pull
    // -----------------------------------------------------------------------

    /// Fetch rows of `kind` newer than `since` and merge them by
    /// last-writer-wins. Returns the number of rows written locally.
    ///
    /// The cursor advances to the last fetched row even when some rows lost
    /// the comparison, so they are not fetched again.
    pub async fn pull_changes(&self, kind: EntityKind, since: Option<&str>) -> Result<usize> {
        if !self.is_online() {
            return Err(Error::Offline);
        }

        let rows = self.inner.remote.fetch_since(kind, since).await?;
        let Some(last) = rows.last() else {
            return Ok(0);
        };

        let mut winners: Vec<Value> = Vec::new();
        for row in &rows {
            let Some(id) = row.get("id").and_then(Value::as_str) else {
                tracing::warn!("Skipping {kind} row without id");
                continue;
            };

            let local = self.inner.store.get_raw(kind, id).await?;
            match resolve(local.as_ref(), row) {
                Resolution::ApplyRemote => winners.push(row.clone()),
                Resolution::Unchanged => {}
                Resolution::KeepLocal => {
                    tracing::debug!("Kept newer local {kind}/{id} over remote row");
                }
            }
        }

        let applied = winners.len();
        self.inner.store.bulk_put_raw(kind, &winners).await?;

        let column = kind.policy().cursor_column;
        let cursor = last
            .get(column)
            .and_then(Value::as_str)
            .map_or_else(now_iso, str::to_string);
        self.advance_cursor(kind, &cursor).await?;

        tracing::debug!("Pulled {kind}: {} fetched, {applied} applied", rows.len());
        Ok(applied)
    }

    /// Pull `kind` from its stored cursor.
    pub async fn pull_kind(&self, kind: EntityKind) -> Result<usize> {
        if !self.is_online() {
            return Err(Error::Offline);
        }
        let since = self.inner.cursors.get(kind).await?;
        self.pull_changes(kind, since.as_deref()).await
    }

    /// Move the cursor forward; an older value never replaces a newer one.
    async fn advance_cursor(&self, kind: EntityKind, cursor: &str) -> Result<()> {
        let current = self.inner.cursors.get(kind).await?;
        let is_ahead = match current.as_deref() {
            Some(current) => compare_timestamps(cursor, current).is_gt(),
            None => true,
        };
        if is_ahead {
            self.inner.cursors.set(kind, cursor).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Full cycle
    // -----------------------------------------------------------------------

    /// Push, then pull every kind.
    ///
    /// Rejected with [`Error::SyncInProgress`] while another cycle runs and
    /// with [`Error::Offline`] when offline. A push failure does not stop the
    /// pulls, and a failed pull of one kind does not stop the others; both are
    /// listed in the report.
    pub async fn sync(&self) -> Result<SyncReport> {
        if !self.is_online() {
            return Err(Error::Offline);
        }
        let _syncing = SyncingGuard::acquire(&self.inner.syncing, &self.inner.status)?;

        let mut report = SyncReport::default();

        // Waits out an opportunistic push instead of skipping
        let push = {
            let _drain = self.inner.push_lock.lock().await;
            self.drain_queue().await
        };
        match push {
            Ok(pushed) => report.pushed = pushed,
            Err(error) => {
                if let Error::PushHalted { pushed, .. } = &error {
                    report.pushed = *pushed;
                }
                report.push_error = Some(error.to_string());
            }
        }

        for kind in EntityKind::ALL {
            match self.pull_kind(kind).await {
                Ok(pulled) => report.pulled += pulled,
                Err(error) => {
                    tracing::warn!("Pull of {kind} failed: {error}");
                    report.pull_failures.push((kind, error.to_string()));
                }
            }
        }

        tracing::info!(
            "Sync finished: {} pushed, {} pulled{}",
            report.pushed,
            report.pulled,
            if report.is_clean() { "" } else { " (with errors)" }
        );
        self.record_error(report.summary_error());
        self.refresh_pending().await;
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Spawn the periodic push: every `interval`, push if online and idle.
    ///
    /// One attempt per tick, so a failing remote sees at most one request
    /// burst per interval. Stops on [`shutdown`](Self::shutdown).
    pub fn spawn_periodic_push(&self, interval: Duration) -> JoinHandle<()> {
        let engine = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        if !engine.is_online() || engine.is_syncing() {
                            continue;
                        }
                        if let Err(error) = engine.push_when_free().await {
                            tracing::debug!("Periodic push did not complete: {error}");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Periodic push stopped");
        })
    }

    /// Stop background work started by this engine.
    ///
    /// In-flight pushes run to completion; nothing is cancelled mid-request.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        tracing::info!("Sync engine shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }
}
