//! Application configuration loaded through the `config` crate.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Directory name under the platform config dir.
pub const APP_DIR: &str = "duochess";
/// Prefix for environment overrides, e.g. `DUOCHESS__GAME_ID=2`.
pub const ENV_PREFIX: &str = "DUOCHESS";

/// Runtime settings for the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the hosted backend, without a trailing slash.
    pub backend_url: String,
    /// Public API key sent with every request.
    pub api_key: String,
    /// Key of the shared game row.
    pub game_id: i64,
    /// Salt appended to secrets before hashing.
    pub salt: String,
    /// Salted SHA-256 digest (hex) to participant name.
    pub players: BTreeMap<String, String>,
    /// Directory holding identity, preferences and the snapshot cache.
    pub data_dir: PathBuf,
    /// Interval between realtime heartbeats.
    pub realtime_heartbeat_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut players = BTreeMap::new();
        players.insert(
            "450b02e834204bad2503ee356eeb190e92ad1ada765e69e058e094fa39b45fe0".to_string(),
            "Benji".to_string(),
        );
        players.insert(
            "97ad62dd650af6c9af2b30df0963a09f40782ff0a4ad8cc976e4ab519e3e1fd9".to_string(),
            "Sanaa".to_string(),
        );
        Self {
            backend_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            game_id: 1,
            salt: "ChessDuo_Salt_2024!".to_string(),
            players,
            data_dir: default_root(),
            realtime_heartbeat_secs: 25,
        }
    }
}

impl AppConfig {
    /// Load from the default config file layered with environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path(), Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from `path` (optional) and the given environment source.
    pub fn load_from(path: &Path, env: Environment) -> Result<Self> {
        let defaults =
            Config::try_from(&AppConfig::default()).context("failed to build default config")?;
        let settings = Config::builder()
            .add_source(defaults)
            .add_source(File::from(path).required(false))
            .add_source(env.separator("__").try_parsing(true))
            .build()
            .with_context(|| format!("failed to load config {}", path.display()))?;
        let config: AppConfig = settings
            .try_deserialize()
            .context("invalid configuration values")?;
        Ok(config.normalized())
    }

    fn normalized(mut self) -> Self {
        while self.backend_url.ends_with('/') {
            self.backend_url.pop();
        }
        self.players = self
            .players
            .into_iter()
            .map(|(digest, name)| (digest.to_ascii_lowercase(), name))
            .collect();
        self.realtime_heartbeat_secs = self.realtime_heartbeat_secs.max(1);
        self
    }

    /// Directory of the snapshot cache.
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }
}

/// `<config dir>/duochess`, falling back to the working directory.
pub fn default_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Location of `config.toml`.
pub fn config_path() -> PathBuf {
    default_root().join("config.toml")
}

/// Write a commented default config file if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    write_default_config(&config_path())
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let defaults = AppConfig::default();
    let mut contents = String::from("# DuoChess client settings\n");
    contents.push_str(&format!("backend_url = \"{}\"\n", defaults.backend_url));
    contents.push_str("api_key = \"\"\n");
    contents.push_str(&format!("game_id = {}\n", defaults.game_id));
    contents.push_str(&format!(
        "realtime_heartbeat_secs = {}\n",
        defaults.realtime_heartbeat_secs
    ));
    fs::write(path, contents)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    info!(path = %path.display(), "Wrote default config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Map;
    use tempfile::tempdir;

    fn no_env() -> Environment {
        Environment::with_prefix(ENV_PREFIX).source(Some(Map::new()))
    }

    #[test]
    fn defaults_apply_without_file() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(&dir.path().join("missing.toml"), no_env())?;
        assert_eq!(config.game_id, 1);
        assert_eq!(config.realtime_heartbeat_secs, 25);
        assert_eq!(config.players.len(), 2);
        assert_eq!(config.salt, "ChessDuo_Salt_2024!");
        Ok(())
    }

    #[test]
    fn file_then_environment_override() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "backend_url = \"https://example.test/\"\ngame_id = 4\napi_key = \"file-key\"\n",
        )?;
        let mut vars = Map::new();
        vars.insert("DUOCHESS__GAME_ID".to_string(), "9".to_string());
        let env = Environment::with_prefix(ENV_PREFIX).source(Some(vars));

        let config = AppConfig::load_from(&path, env)?;
        assert_eq!(config.backend_url, "https://example.test");
        assert_eq!(config.api_key, "file-key");
        assert_eq!(config.game_id, 9);
        Ok(())
    }

    #[test]
    fn default_file_is_written_once_and_loads() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("config.toml");
        write_default_config(&path)?;
        fs::write(&path, "game_id = 3\n")?;
        write_default_config(&path)?;
        let config = AppConfig::load_from(&path, no_env())?;
        assert_eq!(config.game_id, 3);
        Ok(())
    }

    #[test]
    fn generated_default_file_parses() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        write_default_config(&path)?;
        let config = AppConfig::load_from(&path, no_env())?;
        assert_eq!(config.backend_url, AppConfig::default().backend_url);
        Ok(())
    }
}
