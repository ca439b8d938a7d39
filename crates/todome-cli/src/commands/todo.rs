use std::path::Path;

use serde_json::json;
use todome_core::models::{Todo, TodoStatus};
use todome_core::util::now_iso;

use crate::cli::StatusFilter;
use crate::commands::common::{
    format_todo_lines, normalize_tags, open_session, parse_due_date, resolve_record, resolve_title,
    Session,
};
use crate::error::CliError;

pub struct NewTodo {
    pub title: Vec<String>,
    pub priority: Option<u8>,
    pub due: Option<String>,
    pub tags: Vec<String>,
}

pub const fn status_from_filter(filter: StatusFilter) -> TodoStatus {
    match filter {
        StatusFilter::Pending => TodoStatus::Pending,
        StatusFilter::InProgress => TodoStatus::InProgress,
        StatusFilter::Completed => TodoStatus::Completed,
        StatusFilter::Cancelled => TodoStatus::Cancelled,
    }
}

pub async fn add_todo(session: &Session, input: NewTodo) -> Result<Todo, CliError> {
    let title = resolve_title(&input.title)?;
    let mut todo = Todo::new(session.user_id.as_str(), title)?;
    if let Some(priority) = input.priority {
        todo = todo.with_priority(priority)?;
    }
    if let Some(due) = input.due.as_deref() {
        todo.due_date = Some(parse_due_date(due)?);
    }
    todo.tags = normalize_tags(&input.tags);

    session.repo.create(&todo).await?;
    Ok(todo)
}

pub async fn complete_todo(session: &Session, query: &str) -> Result<Todo, CliError> {
    let todo: Todo = resolve_record(session, query).await?;
    let patch = json!({
        "status": TodoStatus::Completed,
        "completed_at": now_iso(),
    });
    Ok(session.repo.update(&todo.id, &patch, &todo).await?)
}

pub async fn remove_todo(session: &Session, query: &str) -> Result<Todo, CliError> {
    let todo: Todo = resolve_record(session, query).await?;
    session.repo.delete(&todo.id, &todo).await?;
    Ok(todo)
}

pub async fn list_todos(
    session: &Session,
    status: Option<StatusFilter>,
    refresh: bool,
) -> Result<Vec<Todo>, CliError> {
    if refresh {
        session.go_online()?;
        // Refreshes the local copy; the filtered read below is local
        session.repo.load::<Todo>(&session.user_id).await?;
    }

    let store = session.repo.store();
    let todos = match status {
        Some(filter) => {
            store
                .list_todos_by_status(&session.user_id, status_from_filter(filter))
                .await?
        }
        None => store.list_by_owner::<Todo>(&session.user_id).await?,
    };
    Ok(todos)
}

pub async fn run_todo_add(
    input: NewTodo,
    user: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let session = open_session(db_path, user)?;
    let todo = add_todo(&session, input).await?;
    session.flush().await;
    println!("{}", todo.id);
    Ok(())
}

pub async fn run_todo_done(id: &str, user: Option<String>, db_path: &Path) -> Result<(), CliError> {
    let session = open_session(db_path, user)?;
    let todo = complete_todo(&session, id).await?;
    session.flush().await;
    println!("{}", todo.id);
    Ok(())
}

pub async fn run_todo_rm(id: &str, user: Option<String>, db_path: &Path) -> Result<(), CliError> {
    let session = open_session(db_path, user)?;
    let todo = remove_todo(&session, id).await?;
    session.flush().await;
    println!("{}", todo.id);
    Ok(())
}

pub async fn run_todo_list(
    status: Option<StatusFilter>,
    refresh: bool,
    as_json: bool,
    user: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let session = open_session(db_path, user)?;
    let todos = list_todos(&session, status, refresh).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&todos)?);
    } else if todos.is_empty() {
        println!("No todos.");
    } else {
        for line in format_todo_lines(&todos) {
            println!("{line}");
        }
    }
    Ok(())
}
