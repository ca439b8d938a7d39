use std::path::Path;

use crate::commands::common::open_session;
use crate::error::CliError;

pub async fn run_sync(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let session = open_session(db_path, None)?;
    session.go_online()?;

    let report = session.engine().sync().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Sync completed: {} pushed, {} pulled",
        report.pushed, report.pulled
    );
    if let Some(error) = &report.push_error {
        eprintln!("Push stopped early: {error}");
    }
    for (kind, error) in &report.pull_failures {
        eprintln!("Pull of {kind} failed: {error}");
    }
    Ok(())
}

pub async fn run_push(db_path: &Path) -> Result<(), CliError> {
    let session = open_session(db_path, None)?;
    session.go_online()?;

    let pushed = session.engine().push_changes().await?;
    let remaining = session.engine().pending_changes().await?;
    println!("Pushed {pushed} change(s); {remaining} pending");
    Ok(())
}
