//! Shared-secret login gate and persisted identity.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::Identity;

/// Why a login attempt was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Nothing was typed.
    #[error("empty code")]
    Empty,
    /// The code does not map to a participant.
    #[error("Incorrect code")]
    Incorrect,
}

/// The two participants of the shared game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    first: String,
    second: String,
}

impl Roster {
    /// Build a roster from exactly two distinct names.
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Result<Self> {
        let first = first.into();
        let second = second.into();
        if first.trim().is_empty() || second.trim().is_empty() || first == second {
            anyhow::bail!("roster needs two distinct participant names");
        }
        Ok(Self { first, second })
    }

    /// Participant that plays white when the row names no white player.
    pub fn default_white(&self) -> &str {
        &self.first
    }

    /// The other participant.
    pub fn opponent_of(&self, name: &str) -> &str {
        if name == self.first {
            &self.second
        } else {
            &self.first
        }
    }

    /// Whether `name` is one of the two participants.
    pub fn contains(&self, name: &str) -> bool {
        name == self.first || name == self.second
    }
}

/// Maps salted digests of the shared secrets to participant names.
#[derive(Debug, Clone)]
pub struct SessionGate {
    salt: String,
    hashes: BTreeMap<String, String>,
}

impl SessionGate {
    /// Create a gate from the configured salt and digest table.
    pub fn new(salt: impl Into<String>, hashes: BTreeMap<String, String>) -> Self {
        let hashes = hashes
            .into_iter()
            .map(|(digest, name)| (digest.to_ascii_lowercase(), name))
            .collect();
        Self {
            salt: salt.into(),
            hashes,
        }
    }

    /// Lowercase hex SHA-256 of the trimmed secret followed by the salt.
    pub fn digest(&self, secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.trim().as_bytes());
        hasher.update(self.salt.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Resolve a secret to the participant it belongs to.
    pub fn authenticate(&self, secret: &str) -> Result<Identity, AuthError> {
        if secret.trim().is_empty() {
            return Err(AuthError::Empty);
        }
        match self.hashes.get(&self.digest(secret)) {
            Some(name) => {
                info!(identity = %name, "Login accepted");
                Ok(Identity(name.clone()))
            }
            None => {
                warn!("Login rejected");
                Err(AuthError::Incorrect)
            }
        }
    }

    /// Participants derived from the digest table, sorted by name.
    pub fn roster(&self) -> Result<Roster> {
        let mut names: Vec<&String> = self.hashes.values().collect();
        names.sort();
        names.dedup();
        match names.as_slice() {
            [first, second] => Roster::new(first.as_str(), second.as_str()),
            other => anyhow::bail!(
                "expected exactly two participants in the player table, found {}",
                other.len()
            ),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredIdentity {
    name: String,
}

/// Identity persisted across restarts until logout.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    /// Store backed by `identity.json` in `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("identity.json"),
        }
    }

    /// Previously persisted identity, if it still belongs to the roster.
    pub fn load(&self, roster: &Roster) -> Result<Option<Identity>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let stored: StoredIdentity = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        if roster.contains(&stored.name) {
            Ok(Some(Identity(stored.name)))
        } else {
            warn!(name = %stored.name, "Ignoring persisted identity outside the roster");
            Ok(None)
        }
    }

    /// Remember `identity` for the next start.
    pub fn persist(&self, identity: &Identity) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let stored = StoredIdentity {
            name: identity.0.clone(),
        };
        let serialized = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    /// Forget the persisted identity (logout).
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}
