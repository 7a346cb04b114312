//! Shared domain models mirrored from the backend tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the participant the client is logged in as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(pub String);

impl Identity {
    /// Borrow the participant name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Row of the shared `chess_state` table.
///
/// Every column except the key is optional: realtime payloads and older rows
/// may omit fields, and an absent clock column must leave local clock state
/// untouched rather than zero it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Fixed game key.
    #[serde(default)]
    pub id: i64,
    /// Position in Forsyth–Edwards notation.
    #[serde(default)]
    pub fen: Option<String>,
    /// Full move list; authoritative over `fen` when non-empty.
    #[serde(default)]
    pub pgn: Option<String>,
    /// Identity playing the white pieces.
    #[serde(default)]
    pub white_player: Option<String>,
    /// Last move as `"<from>-<to>"`, empty when none.
    #[serde(default)]
    pub last_move: Option<String>,
    /// White's remaining time in milliseconds at `last_move_ts`.
    #[serde(default)]
    pub white_time: Option<i64>,
    /// Black's remaining time in milliseconds at `last_move_ts`.
    #[serde(default)]
    pub black_time: Option<i64>,
    /// Epoch milliseconds at which the clock snapshot was taken.
    #[serde(default)]
    pub last_move_ts: Option<i64>,
    /// Milliseconds per side, `0` for an untimed game.
    #[serde(default)]
    pub time_control: Option<i64>,
}

impl GameRecord {
    /// Non-empty move list, if any.
    pub fn pgn_text(&self) -> Option<&str> {
        self.pgn.as_deref().map(str::trim).filter(|pgn| !pgn.is_empty())
    }

    /// Non-empty position string, if any.
    pub fn fen_text(&self) -> Option<&str> {
        self.fen.as_deref().map(str::trim).filter(|fen| !fen.is_empty())
    }

    /// Apply a patch the same way the backend would (unconditional overwrite).
    pub fn apply_patch(&mut self, patch: &GamePatch) {
        if let Some(fen) = &patch.fen {
            self.fen = Some(fen.clone());
        }
        if let Some(pgn) = &patch.pgn {
            self.pgn = Some(pgn.clone());
        }
        if let Some(white) = &patch.white_player {
            self.white_player = Some(white.clone());
        }
        if let Some(last) = &patch.last_move {
            self.last_move = Some(last.clone());
        }
        if patch.white_time.is_some() {
            self.white_time = patch.white_time;
        }
        if patch.black_time.is_some() {
            self.black_time = patch.black_time;
        }
        if patch.last_move_ts.is_some() {
            self.last_move_ts = patch.last_move_ts;
        }
        if patch.time_control.is_some() {
            self.time_control = patch.time_control;
        }
    }
}

/// Partial update body written to the shared row.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GamePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pgn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_player: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_move: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub black_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_move_ts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_control: Option<i64>,
}

/// Row of the `chess_chat` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Surrogate key, used to match deletions.
    pub id: i64,
    /// Game the message belongs to.
    #[serde(default)]
    pub game_id: i64,
    /// Sender identity.
    pub sender: String,
    /// Message body.
    pub text: String,
    /// Creation time assigned by the backend.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Insert body for a new chat message; the backend assigns `id` and `created_at`.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewChatMessage {
    pub game_id: i64,
    pub sender: String,
    pub text: String,
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_tolerates_missing_columns() {
        let record: GameRecord = serde_json::from_value(json!({
            "id": 1,
            "fen": "",
            "white_player": "Benji"
        }))
        .expect("record should parse");
        assert_eq!(record.id, 1);
        assert_eq!(record.fen_text(), None);
        assert_eq!(record.pgn_text(), None);
        assert_eq!(record.white_time, None);
        assert_eq!(record.white_player.as_deref(), Some("Benji"));
    }

    #[test]
    fn patch_serializes_only_present_fields() {
        let patch = GamePatch {
            fen: Some("start".to_string()),
            last_move_ts: Some(42),
            ..GamePatch::default()
        };
        let value = serde_json::to_value(&patch).expect("patch should serialize");
        assert_eq!(value, json!({"fen": "start", "last_move_ts": 42}));
    }

    #[test]
    fn apply_patch_overwrites_unconditionally() {
        let mut record = GameRecord {
            id: 7,
            pgn: Some("1. e4".to_string()),
            white_time: Some(1000),
            ..GameRecord::default()
        };
        record.apply_patch(&GamePatch {
            pgn: Some(String::new()),
            white_time: Some(500),
            ..GamePatch::default()
        });
        assert_eq!(record.pgn.as_deref(), Some(""));
        assert_eq!(record.white_time, Some(500));
        assert_eq!(record.id, 7);
    }
}
