use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use todome_core::config::SyncConfig;
use todome_core::db::{Database, LocalStore, MutationQueue, SqliteCursorStore};
use todome_core::models::{Note, QueueEntry, Todo, TodoStatus};
use todome_core::remote::{PostgrestClient, RemoteResult};
use todome_core::util::parse_timestamp;
use todome_core::{Entity, EntityKind, RemoteClient, RemoteError, Repository, SyncEngine};

use crate::error::CliError;

pub const DEFAULT_USER_ID: &str = "local";

/// Remote client that is absent when no endpoint is configured.
///
/// Sessions without a remote never go online, so the engine never calls it.
#[derive(Debug, Clone, Default)]
pub struct OptionalRemote(Option<PostgrestClient>);

impl OptionalRemote {
    fn client(&self) -> RemoteResult<&PostgrestClient> {
        self.0
            .as_ref()
            .ok_or_else(|| RemoteError::Transport("no remote configured".to_string()))
    }
}

impl RemoteClient for OptionalRemote {
    async fn fetch_since(&self, kind: EntityKind, since: Option<&str>) -> RemoteResult<Vec<Value>> {
        self.client()?.fetch_since(kind, since).await
    }

    async fn insert(&self, kind: EntityKind, record: &Value) -> RemoteResult<()> {
        self.client()?.insert(kind, record).await
    }

    async fn update_partial(&self, kind: EntityKind, id: &str, patch: &Value) -> RemoteResult<()> {
        self.client()?.update_partial(kind, id, patch).await
    }
}

pub type CliEngine = SyncEngine<OptionalRemote>;
pub type CliRepository = Repository<OptionalRemote>;

/// Open database, engine, and façade for one command invocation.
///
/// The engine starts offline; commands that talk to the remote call
/// [`Session::go_online`] first.
pub struct Session {
    pub repo: CliRepository,
    pub config: SyncConfig,
    pub user_id: String,
}

impl Session {
    pub const fn engine(&self) -> &CliEngine {
        self.repo.engine()
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub fn go_online(&self) -> Result<(), CliError> {
        if !self.is_configured() {
            return Err(CliError::SyncNotConfigured);
        }
        self.engine().set_online(true);
        Ok(())
    }

    /// Push local writes right away when a remote is configured.
    ///
    /// A failed push is reported but not fatal: the change is saved and
    /// stays queued for the next push.
    pub async fn flush(&self) {
        if !self.is_configured() {
            return;
        }
        self.engine().set_online(true);
        match self.engine().push_changes().await {
            Ok(pushed) => tracing::debug!("Pushed {pushed} change(s) after write"),
            Err(error) => eprintln!("Saved locally; push deferred: {error}"),
        }
    }
}

pub fn open_session(db_path: &Path, user: Option<String>) -> Result<Session, CliError> {
    let config = SyncConfig::from_env()?;
    open_session_with(db_path, config, resolve_user_id(user))
}

pub fn open_session_with(
    db_path: &Path,
    config: SyncConfig,
    user_id: String,
) -> Result<Session, CliError> {
    let remote = if config.is_configured() {
        tracing::debug!("Remote sync enabled");
        OptionalRemote(Some(PostgrestClient::new(&config)?))
    } else {
        tracing::debug!("Running in local-only mode (no remote configured)");
        OptionalRemote(None)
    };

    let db = Database::open(db_path)?;
    let engine = SyncEngine::new(
        LocalStore::new(db.clone()),
        MutationQueue::new(db.clone()),
        remote,
        SqliteCursorStore::new(db),
        false,
    );

    Ok(Session {
        repo: Repository::new(engine),
        config,
        user_id,
    })
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TODOME_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("todome")
        .join("todome.db")
}

pub fn resolve_user_id(cli_user: Option<String>) -> String {
    cli_user
        .or_else(|| env::var("TODOME_USER_ID").ok())
        .and_then(|user| normalize_text(&user))
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string())
}

// ---------------------------------------------------------------------------
// Input handling
// ---------------------------------------------------------------------------

pub fn normalize_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn resolve_title(parts: &[String]) -> Result<String, CliError> {
    normalize_text(&parts.join(" ")).ok_or(CliError::EmptyTitle)
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    normalize_text(id).ok_or(CliError::EmptyId)
}

pub fn parse_due_date(raw: &str) -> Result<String, CliError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| date.format("%Y-%m-%d").to_string())
        .map_err(|_| CliError::InvalidDate(trimmed.to_string()))
}

pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = tags
        .iter()
        .filter_map(|tag| normalize_text(tag.trim_start_matches('#')))
        .map(|tag| tag.to_lowercase())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// Find a live record by full id or unique id prefix.
pub async fn resolve_record<T: Entity>(session: &Session, query: &str) -> Result<T, CliError> {
    let query = normalize_identifier(query)?;
    if let Some(record) = session.repo.get::<T>(&query).await? {
        return Ok(record);
    }

    let mut matches: Vec<T> = session
        .repo
        .list_by_owner::<T>(&session.user_id)
        .await?
        .into_iter()
        .filter(|record| record.id().starts_with(&query))
        .collect();

    match matches.len() {
        0 => Err(CliError::RecordNotFound {
            kind: T::KIND,
            query,
        }),
        1 => Ok(matches.remove(0)),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|record| short_id(record.id()))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousId(format!(
                "Id prefix '{query}' matches multiple {}: {options}",
                T::KIND
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub tags: Vec<String>,
    pub folder_id: Option<String>,
    pub updated_at: String,
    pub relative_time: String,
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn render_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub const fn status_marker(status: TodoStatus) -> char {
    match status {
        TodoStatus::Pending => ' ',
        TodoStatus::InProgress => '~',
        TodoStatus::Completed => 'x',
        TodoStatus::Cancelled => '-',
    }
}

pub fn format_todo_lines(todos: &[Todo]) -> Vec<String> {
    todos
        .iter()
        .map(|todo| {
            let title = preview(&todo.title, 40);
            let mut line = format!(
                "{:<13}  [{}] P{}  {title:<40}",
                short_id(&todo.id),
                status_marker(todo.status),
                todo.priority
            );
            if let Some(due) = &todo.due_date {
                line.push_str(&format!("  due {due}"));
            }
            if !todo.tags.is_empty() {
                line.push_str("  ");
                line.push_str(&render_tags(&todo.tags));
            }
            line.trim_end().to_string()
        })
        .collect()
}

pub fn note_to_list_item(note: &Note, now: DateTime<Utc>) -> NoteListItem {
    NoteListItem {
        id: note.id.clone(),
        title: note.title.clone(),
        preview: preview(note.plain_text.as_deref().unwrap_or_default(), 80),
        tags: note.tags.clone(),
        folder_id: note.folder_id.clone(),
        updated_at: note.updated_at.clone(),
        relative_time: format_relative_time(&note.updated_at, now),
    }
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now = Utc::now();
    notes
        .iter()
        .map(|note| {
            let title = preview(&note.title, 40);
            let relative_time = format_relative_time(&note.updated_at, now);
            let tags = render_tags(&note.tags);

            if tags.is_empty() {
                format!("{:<13}  {title:<40}  {relative_time}", short_id(&note.id))
            } else {
                format!(
                    "{:<13}  {title:<40}  {relative_time:<10}  {tags}",
                    short_id(&note.id)
                )
            }
        })
        .collect()
}

pub fn format_queue_lines(entries: &[QueueEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "{:>6}  {:<6}  {}/{}  {}",
                entry.sequence,
                entry.operation.as_str(),
                entry.table,
                entry.record_id,
                entry.enqueued_at
            )
        })
        .collect()
}

pub fn format_relative_time(timestamp: &str, now: DateTime<Utc>) -> String {
    let Some(at) = parse_timestamp(timestamp) else {
        return timestamp.to_string();
    };

    let diff = now.signed_duration_since(at).num_milliseconds().max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
