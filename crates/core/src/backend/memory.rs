use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{BackendError, GameStore};
use crate::models::{ChatMessage, GamePatch, GameRecord, NewChatMessage};

/// [`GameStore`] that keeps one game row and its chat in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<GameRecord>,
    chat: Mutex<Vec<ChatMessage>>,
    next_chat_id: AtomicI64,
    offline: AtomicBool,
}

impl MemoryStore {
    /// Store seeded with `record`.
    pub fn new(record: GameRecord) -> Self {
        Self {
            record: Mutex::new(record),
            next_chat_id: AtomicI64::new(1),
            ..Self::default()
        }
    }

    /// Current row.
    pub fn record(&self) -> GameRecord {
        self.record.lock().clone()
    }

    /// Current chat rows.
    pub fn chat(&self) -> Vec<ChatMessage> {
        self.chat.lock().clone()
    }

    /// Make every call fail as if the network were down.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), BackendError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(BackendError::Status {
                status: 503,
                body: "offline".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn fetch_game(&self) -> Result<GameRecord, BackendError> {
        self.check_online()?;
        Ok(self.record())
    }

    async fn update_game(&self, patch: &GamePatch) -> Result<(), BackendError> {
        self.check_online()?;
        self.record.lock().apply_patch(patch);
        Ok(())
    }

    async fn list_chat(&self) -> Result<Vec<ChatMessage>, BackendError> {
        self.check_online()?;
        Ok(self.chat())
    }

    async fn insert_chat(&self, message: &NewChatMessage) -> Result<(), BackendError> {
        self.check_online()?;
        let id = self.next_chat_id.fetch_add(1, Ordering::SeqCst).max(1);
        self.chat.lock().push(ChatMessage {
            id,
            game_id: message.game_id,
            sender: message.sender.clone(),
            text: message.text.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn clear_chat(&self) -> Result<(), BackendError> {
        self.check_online()?;
        self.chat.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn patches_and_chat_round_trip() -> Result<(), BackendError> {
        let store = MemoryStore::new(GameRecord {
            id: 1,
            ..GameRecord::default()
        });
        store
            .update_game(&GamePatch {
                pgn: Some("1. e4".to_string()),
                ..GamePatch::default()
            })
            .await?;
        assert_eq!(store.fetch_game().await?.pgn.as_deref(), Some("1. e4"));

        let message = NewChatMessage {
            game_id: 1,
            sender: "Benji".to_string(),
            text: "hi".to_string(),
        };
        store.insert_chat(&message).await?;
        store.insert_chat(&message).await?;
        let chat = store.list_chat().await?;
        assert_eq!(chat.len(), 2);
        assert_ne!(chat[0].id, chat[1].id);
        store.clear_chat().await?;
        assert!(store.list_chat().await?.is_empty());

        store.set_offline(true);
        assert!(store.fetch_game().await.is_err());
        Ok(())
    }
}
