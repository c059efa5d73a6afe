//! Catalog service binary: initial sync, assignment sweep, duplicate scan,
//! then the daily scheduler until interrupted.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use sermon_archive::catalog::{auto_assign_speakers, clean_duplicates};
use sermon_archive::config::Config;
use sermon_archive::database::Database;
use sermon_archive::ingest::{self, provider::YouTubeClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::var("SERMON_ARCHIVE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yaml"));
    let config = Config::load(&config_path)?;

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create data directory {}", parent.display()))?;
    }
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!("Catalog database: {}", db_path.display());

    let client = Arc::new(YouTubeClient::new(config.api_key()?)?);
    let cancel = CancellationToken::new();

    // Stop scheduling new work on ctrl-c; in-flight items finish.
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            signal_cancel.cancel();
        }
    });

    // Initial sync so a fresh install has a catalog before the first
    // scheduled run.
    match ingest::sync_channel(&db, &client, &config.youtube.channel, &cancel).await {
        Ok(report) => tracing::info!(
            "Initial sync: {} added, {} updated, {} error(s)",
            report.created,
            report.updated,
            report.errors
        ),
        Err(e) => tracing::error!("Initial sync failed: {}", e),
    }

    if config.sync.auto_assign && !cancel.is_cancelled() {
        match auto_assign_speakers(&db, false, &cancel) {
            Ok(report) => tracing::info!(
                "Initial assignment sweep: {} assigned, {} new speaker(s)",
                report.assigned,
                report.created
            ),
            Err(e) => tracing::error!("Assignment sweep failed: {}", e),
        }

        // Surface (but never auto-apply) duplicate speakers.
        match clean_duplicates(&db, true) {
            Ok(report) if !report.groups.is_empty() => {
                for group in &report.groups {
                    tracing::warn!(
                        "Probable duplicate speakers: keeper {:?} ← {:?}",
                        group.keeper_name,
                        group.duplicate_names
                    );
                }
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Duplicate scan failed: {}", e),
        }
    }

    ingest::run_scheduler(
        db,
        client,
        config.youtube.channel.clone(),
        config.sync.clone(),
        cancel,
    )
    .await;

    Ok(())
}
