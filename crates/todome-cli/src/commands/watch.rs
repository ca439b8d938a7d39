use std::path::Path;
use std::time::Duration;

use crate::commands::common::open_session;
use crate::error::CliError;

pub async fn run_watch(interval_secs: Option<u64>, db_path: &Path) -> Result<(), CliError> {
    let session = open_session(db_path, None)?;
    session.go_online()?;

    let interval = interval_secs
        .filter(|secs| *secs > 0)
        .map_or_else(|| session.config.push_interval(), Duration::from_secs);
    let engine = session.engine().clone();

    // Start from an empty queue instead of waiting a full interval
    match engine.push_changes().await {
        Ok(pushed) => tracing::info!("Initial push: {pushed} change(s)"),
        Err(error) => tracing::warn!("Initial push failed: {error}"),
    }

    println!(
        "Pushing every {}s; press Ctrl-C to stop",
        interval.as_secs()
    );
    let periodic = engine.spawn_periodic_push(interval);

    tokio::signal::ctrl_c().await?;
    engine.shutdown();
    if let Err(error) = periodic.await {
        tracing::warn!("Periodic push task ended abnormally: {error}");
    }

    let pending = engine.pending_changes().await?;
    println!("Stopped; {pending} change(s) pending");
    Ok(())
}
