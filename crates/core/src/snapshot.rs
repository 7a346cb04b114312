//! Offline snapshot of the last fetched game row.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::models::{ChatMessage, GameRecord};

/// Bump when the snapshot layout changes; older files are discarded.
pub const SNAPSHOT_VERSION: u32 = 1;

static SNAPSHOT_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^game-snapshot-v(\d+)\.json$").expect("valid snapshot regex"));

/// Cached copy of the shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Game row as last fetched.
    pub record: GameRecord,
    /// Chat history as last fetched.
    #[serde(default)]
    pub chat: Vec<ChatMessage>,
    /// When the snapshot was written.
    pub saved_at: DateTime<Utc>,
}

/// Versioned snapshot file inside the cache directory.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    /// Open the cache in `dir`, removing snapshots of other versions.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create cache directory {}", dir.display()))?;
        remove_stale(dir);
        Ok(Self {
            path: dir.join(file_name(SNAPSHOT_VERSION)),
        })
    }

    /// Path of the current snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last stored snapshot, if any.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read snapshot {}", self.path.display()))?;
        let snapshot = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse snapshot {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    /// Replace the stored snapshot.
    pub fn store(&self, record: &GameRecord, chat: &[ChatMessage]) -> Result<()> {
        let snapshot = Snapshot {
            record: record.clone(),
            chat: chat.to_vec(),
            saved_at: Utc::now(),
        };
        let serialized =
            serde_json::to_string_pretty(&snapshot).context("failed to serialize snapshot")?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write snapshot {}", self.path.display()))?;
        debug!(path = %self.path.display(), "Stored game snapshot");
        Ok(())
    }
}

fn file_name(version: u32) -> String {
    format!("game-snapshot-v{version}.json")
}

fn remove_stale(dir: &Path) {
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        let Some(captures) = SNAPSHOT_FILE_RE.captures(&name) else {
            continue;
        };
        if captures[1].parse::<u32>().ok() == Some(SNAPSHOT_VERSION) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => info!(path = %entry.path().display(), "Removed stale snapshot"),
            Err(err) => warn!(path = %entry.path().display(), "Failed to remove stale snapshot: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_removes_other_versions_only() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("game-snapshot-v0.json"), "{}")?;
        fs::write(dir.path().join(file_name(SNAPSHOT_VERSION)), "{}")?;
        fs::write(dir.path().join("unrelated.json"), "{}")?;

        let cache = SnapshotCache::open(dir.path())?;
        assert!(!dir.path().join("game-snapshot-v0.json").exists());
        assert!(cache.path().exists());
        assert!(dir.path().join("unrelated.json").exists());
        Ok(())
    }

    #[test]
    fn store_then_load() -> Result<()> {
        let dir = tempdir()?;
        let cache = SnapshotCache::open(dir.path().join("cache"))?;
        assert!(cache.load()?.is_none());

        let record = GameRecord {
            id: 1,
            pgn: Some("1. e4".to_string()),
            white_time: Some(1_000),
            ..GameRecord::default()
        };
        cache.store(&record, &[])?;
        let snapshot = cache.load()?.expect("snapshot was stored");
        assert_eq!(snapshot.record, record);
        assert!(snapshot.chat.is_empty());
        Ok(())
    }
}
