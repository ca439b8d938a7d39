use std::path::Path;

use todome_core::db::CursorStore;

use crate::commands::common::open_session;
use crate::error::CliError;

pub async fn run_reset_cursors(db_path: &Path) -> Result<(), CliError> {
    let session = open_session(db_path, None)?;
    session.engine().cursors().clear().await?;
    println!("Pull cursors cleared; the next sync fetches everything");
    Ok(())
}
