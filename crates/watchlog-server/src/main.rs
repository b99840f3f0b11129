//! watchlog server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, and serves the JSON API under `/api`.

mod catalog;
mod config;

use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use watchlog_api::{AppState, api_router};
use watchlog_core::{job::JobRegistry, tracker::Tracker};
use watchlog_store_sqlite::SqliteStore;

use crate::{catalog::TmdbCatalog, config::expand_tilde};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(author, version, about = "watchlog progress tracking server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = config::load(&cli.config)?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if cfg.tmdb_api_key.is_empty() {
    tracing::warn!("tmdb_api_key is not set; catalog lookups will fail");
  }
  let catalog = TmdbCatalog::new(&cfg.tmdb_base_url, &cfg.tmdb_api_key)
    .context("failed to build catalog client")?;

  let tracker = Tracker::new(store, catalog).with_automation(cfg.automate_statuses);
  let jobs = JobRegistry::new();
  if let Some(secs) = cfg.job_retention_secs {
    spawn_job_sweeper(jobs.clone(), Duration::from_secs(secs));
  }

  let app = Router::new().nest("/api", api_router(AppState::new(tracker, jobs)));
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Periodically drop finished jobs older than `retention`.
fn spawn_job_sweeper(jobs: JobRegistry, retention: Duration) {
  tracing::info!(retention_secs = retention.as_secs(), "job sweeper enabled");
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
      ticker.tick().await;
      jobs.prune_finished(retention);
    }
  });
}
