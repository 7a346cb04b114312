//! Local display preferences.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Built-in palettes plus the user-defined one.
pub const THEMES: [&str; 5] = ["dark", "light", "wood", "ocean", "custom"];

/// User-defined palette, colours as `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPalette {
    /// Screen background.
    pub bg: String,
    /// Panel background; older files may lack it.
    #[serde(default = "default_card_bg")]
    pub card_bg: String,
    /// Light squares.
    pub board_light: String,
    /// Dark squares.
    pub board_dark: String,
    /// Highlights and borders.
    pub accent: String,
}

fn default_card_bg() -> String {
    "#3d3126".to_string()
}

impl Default for CustomPalette {
    fn default() -> Self {
        Self {
            bg: "#2b2118".to_string(),
            card_bg: default_card_bg(),
            board_light: "#f0d9b5".to_string(),
            board_dark: "#b58863".to_string(),
            accent: "#e0a458".to_string(),
        }
    }
}

/// Persisted preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefs {
    /// Active theme name, one of [`THEMES`].
    #[serde(default = "default_theme")]
    pub theme: String,
    /// Palette used when `theme` is `custom`.
    #[serde(default)]
    pub custom: Option<CustomPalette>,
}

fn default_theme() -> String {
    "dark".to_string()
}

impl Default for Prefs {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            custom: None,
        }
    }
}

impl Prefs {
    /// Switch to `name`, ignoring unknown themes.
    pub fn set_theme(&mut self, name: &str) -> bool {
        if !THEMES.contains(&name) {
            return false;
        }
        self.theme = name.to_string();
        if name == "custom" && self.custom.is_none() {
            self.custom = Some(CustomPalette::default());
        }
        true
    }

    /// Theme after `theme` in [`THEMES`], wrapping around.
    pub fn cycle_theme(&mut self) -> &str {
        let index = THEMES
            .iter()
            .position(|name| *name == self.theme)
            .map_or(0, |index| (index + 1) % THEMES.len());
        self.set_theme(THEMES[index]);
        &self.theme
    }
}

/// Reads and writes `prefs.json` in the data dir.
#[derive(Debug, Clone)]
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    /// Store backed by `prefs.json` in `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("prefs.json"),
        }
    }

    /// Saved preferences, or defaults when missing or unreadable.
    pub fn load(&self) -> Prefs {
        match self.try_load() {
            Ok(prefs) => prefs,
            Err(err) => {
                warn!("Falling back to default preferences: {err:#}");
                Prefs::default()
            }
        }
    }

    fn try_load(&self) -> Result<Prefs> {
        if !self.path.exists() {
            return Ok(Prefs::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let mut prefs: Prefs = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        if !THEMES.contains(&prefs.theme.as_str()) {
            prefs.theme = default_theme();
        }
        Ok(prefs)
    }

    /// Write preferences, creating the data dir if needed.
    pub fn persist(&self, prefs: &Prefs) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let serialized =
            serde_json::to_string_pretty(prefs).context("failed to serialize preferences")?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_and_defaults() -> Result<()> {
        let dir = tempdir()?;
        let store = PrefsStore::new(dir.path());
        assert_eq!(store.load(), Prefs::default());

        let mut prefs = Prefs::default();
        assert!(prefs.set_theme("custom"));
        assert!(prefs.custom.is_some());
        store.persist(&prefs)?;
        assert_eq!(store.load(), prefs);
        Ok(())
    }

    #[test]
    fn old_palette_without_card_bg_loads() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("prefs.json"),
            r##"{"theme":"custom","custom":{"bg":"#000000","boardLight":"#ffffff","boardDark":"#333333","accent":"#ff0000"}}"##,
        )?;
        let prefs = PrefsStore::new(dir.path()).load();
        assert_eq!(prefs.custom.map(|palette| palette.card_bg).as_deref(), Some("#3d3126"));
        Ok(())
    }

    #[test]
    fn unknown_or_corrupt_values_fall_back() -> Result<()> {
        let dir = tempdir()?;
        let store = PrefsStore::new(dir.path());
        fs::write(dir.path().join("prefs.json"), r#"{"theme":"neon"}"#)?;
        assert_eq!(store.load().theme, "dark");
        fs::write(dir.path().join("prefs.json"), "{not json")?;
        assert_eq!(store.load(), Prefs::default());
        Ok(())
    }

    #[test]
    fn cycling_visits_every_theme() {
        let mut prefs = Prefs::default();
        let mut seen = vec![prefs.theme.clone()];
        for _ in 1..THEMES.len() {
            seen.push(prefs.cycle_theme().to_string());
        }
        assert_eq!(seen, THEMES.to_vec());
        assert_eq!(prefs.cycle_theme(), "dark");
        assert!(!prefs.set_theme("neon"));
    }
}
