use std::path::Path;

use crate::commands::common::{format_queue_lines, open_session};
use crate::error::CliError;

pub async fn run_queue(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let session = open_session(db_path, None)?;
    let entries = session.engine().queue().drain().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }

    for line in format_queue_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}
