//! Todome CLI - offline-first notes and todos from the terminal
//!
//! Every write lands in the local database first and is pushed to the remote
//! store when one is configured.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands, NoteCommands, TodoCommands};
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::cursors::run_reset_cursors;
use crate::commands::note::{run_note_add, run_note_list};
use crate::commands::queue::run_queue;
use crate::commands::status::run_status;
use crate::commands::sync::{run_push, run_sync};
use crate::commands::todo::{run_todo_add, run_todo_done, run_todo_list, run_todo_rm, NewTodo};
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("todome=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let user = cli.user;

    match cli.command {
        Commands::Status { json } => run_status(json, user, &db_path).await?,
        Commands::Queue { json } => run_queue(json, &db_path).await?,
        Commands::Sync { json } => run_sync(json, &db_path).await?,
        Commands::Push => run_push(&db_path).await?,
        Commands::Todo { command } => match command {
            TodoCommands::Add {
                title,
                priority,
                due,
                tags,
            } => {
                let input = NewTodo {
                    title,
                    priority,
                    due,
                    tags,
                };
                run_todo_add(input, user, &db_path).await?;
            }
            TodoCommands::Done { id } => run_todo_done(&id, user, &db_path).await?,
            TodoCommands::Rm { id } => run_todo_rm(&id, user, &db_path).await?,
            TodoCommands::List {
                status,
                refresh,
                json,
            } => run_todo_list(status, refresh, json, user, &db_path).await?,
        },
        Commands::Note { command } => match command {
            NoteCommands::Add { title, body, tags } => {
                run_note_add(&title, body.as_deref(), &tags, user, &db_path).await?;
            }
            NoteCommands::List { tag, refresh, json } => {
                run_note_list(tag.as_deref(), refresh, json, user, &db_path).await?;
            }
        },
        Commands::Watch { interval } => run_watch(interval, &db_path).await?,
        Commands::ResetCursors => run_reset_cursors(&db_path).await?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
