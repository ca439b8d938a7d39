use std::path::Path;

use serde::Serialize;
use todome_core::db::CursorStore;
use todome_core::EntityKind;

use crate::commands::common::{open_session, Session};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub db_path: String,
    pub remote_configured: bool,
    pub user_id: String,
    pub pending: usize,
    pub cursors: Vec<CursorItem>,
}

#[derive(Debug, Serialize)]
pub struct CursorItem {
    pub kind: EntityKind,
    pub cursor: Option<String>,
}

pub async fn collect_status(session: &Session, db_path: &Path) -> Result<StatusReport, CliError> {
    let mut cursors = Vec::with_capacity(EntityKind::ALL.len());
    for kind in EntityKind::ALL {
        cursors.push(CursorItem {
            kind,
            cursor: session.engine().cursors().get(kind).await?,
        });
    }

    Ok(StatusReport {
        db_path: db_path.display().to_string(),
        remote_configured: session.is_configured(),
        user_id: session.user_id.clone(),
        pending: session.engine().pending_changes().await?,
        cursors,
    })
}

pub async fn run_status(as_json: bool, user: Option<String>, db_path: &Path) -> Result<(), CliError> {
    let session = open_session(db_path, user)?;
    let report = collect_status(&session, db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Database:  {}", report.db_path);
    println!(
        "Remote:    {}",
        if report.remote_configured {
            "configured"
        } else {
            "not configured (local only)"
        }
    );
    println!("User:      {}", report.user_id);
    println!("Pending:   {}", report.pending);
    println!("Cursors:");
    for item in &report.cursors {
        println!(
            "  {:<16} {}",
            item.kind.table(),
            item.cursor.as_deref().unwrap_or("(never pulled)")
        );
    }
    Ok(())
}
