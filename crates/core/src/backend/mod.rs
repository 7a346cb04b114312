//! Access to the hosted backend: the shared game row, chat rows and the
//! realtime change feed.

/// In-memory store used by tests and offline runs.
pub mod memory;
/// Phoenix-channel change subscription.
pub mod realtime;
/// PostgREST-style HTTP store.
pub mod rest;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ChatMessage, GamePatch, GameRecord, NewChatMessage};

pub use memory::MemoryStore;
pub use realtime::{ConnectionStatus, Realtime, RemoteEvent};
pub use rest::RestStore;

/// Table holding the shared game row.
pub const GAME_TABLE: &str = "chess_state";
/// Table holding chat messages.
pub const CHAT_TABLE: &str = "chess_chat";

/// Failures talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport or decoding failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },
    /// The game row does not exist.
    #[error("game {0} not found")]
    NotFound(i64),
    /// The realtime socket failed.
    #[error("realtime: {0}")]
    Realtime(String),
}

/// Storage operations the client needs.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Read the shared game row.
    async fn fetch_game(&self) -> Result<GameRecord, BackendError>;
    /// Overwrite the given columns of the shared row.
    async fn update_game(&self, patch: &GamePatch) -> Result<(), BackendError>;
    /// Chat history of the game, oldest first.
    async fn list_chat(&self) -> Result<Vec<ChatMessage>, BackendError>;
    /// Append a chat message.
    async fn insert_chat(&self, message: &NewChatMessage) -> Result<(), BackendError>;
    /// Delete every chat message of the game.
    async fn clear_chat(&self) -> Result<(), BackendError>;
}
