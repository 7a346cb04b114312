mod app;
mod input;
mod theme;
mod ui;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    sync::Arc,
};

use duochess_core::{
    auth::{IdentityStore, SessionGate},
    backend::{Realtime, RestStore},
    config::{self, AppConfig},
    prefs::PrefsStore,
    snapshot::SnapshotCache,
    sync::SyncHandle,
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    info!(backend = %config.backend_url, game_id = config.game_id, "Starting DuoChess");

    let gate = SessionGate::new(config.salt.clone(), config.players.clone());
    let roster = gate.roster().context("config must name exactly two players")?;

    let store = Arc::new(RestStore::new(&config).context("failed to build backend client")?);
    let cache = match SnapshotCache::open(config.cache_dir()) {
        Ok(cache) => Some(cache),
        Err(err) => {
            warn!("Snapshot cache disabled: {err:#}");
            None
        }
    };

    let (sync_tx, sync_rx) = mpsc::channel(16);
    let (remote_tx, remote_rx) = mpsc::channel(64);
    let realtime = Realtime::new(&config, remote_tx).context("invalid realtime endpoint")?;
    let sync = SyncHandle::new(store, cache, config.game_id, sync_tx).with_realtime(realtime);

    let mut app = app::DuoChessApp::new(
        gate,
        roster,
        IdentityStore::new(&config.data_dir),
        PrefsStore::new(&config.data_dir),
        sync,
    );
    app.attach_sync(sync_rx);
    app.attach_remote(remote_rx);
    app.run().await
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("duochess.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The terminal belongs to the UI, so logs only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
