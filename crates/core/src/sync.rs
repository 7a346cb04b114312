//! Background synchronisation with the backend.
//!
//! Reads are reported back to the event loop as [`SyncEvent`]s. Writes are
//! optimistic: the local state has already changed, so failures are logged
//! and dropped.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::{
    backend::{GameStore, Realtime},
    models::{ChatMessage, GamePatch, GameRecord, Identity, NewChatMessage},
    snapshot::SnapshotCache,
};

/// Where the initial state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Fresh from the backend.
    Network,
    /// From the offline snapshot.
    Cache,
}

/// Events emitted by the synchroniser.
#[derive(Debug)]
pub enum SyncEvent {
    /// Startup load finished.
    Loaded {
        /// Game row.
        record: GameRecord,
        /// Chat history.
        chat: Vec<ChatMessage>,
        /// Network or snapshot.
        source: LoadSource,
    },
    /// Neither the backend nor the snapshot had data; the client keeps its local board.
    Unavailable(String),
    /// Forced refetch after resume.
    Refreshed {
        /// Game row.
        record: GameRecord,
        /// Chat history.
        chat: Vec<ChatMessage>,
    },
    /// The chat was cleared on the backend.
    ChatCleared,
}

/// Cheap handle used by the event loop to trigger backend work.
#[derive(Clone)]
pub struct SyncHandle {
    store: Arc<dyn GameStore>,
    cache: Option<SnapshotCache>,
    realtime: Option<Realtime>,
    game_id: i64,
    sender: mpsc::Sender<SyncEvent>,
}

impl SyncHandle {
    /// Create a handle reporting to `sender`.
    pub fn new(
        store: Arc<dyn GameStore>,
        cache: Option<SnapshotCache>,
        game_id: i64,
        sender: mpsc::Sender<SyncEvent>,
    ) -> Self {
        Self {
            store,
            cache,
            realtime: None,
            game_id,
            sender,
        }
    }

    /// Attach the change subscription started after the initial load.
    pub fn with_realtime(mut self, realtime: Realtime) -> Self {
        self.realtime = Some(realtime);
        self
    }

    /// Fetch the game row and chat, network first with snapshot fallback,
    /// then subscribe to changes.
    pub async fn load_initial(&self) {
        let event = match self.fetch_all().await {
            Ok((record, chat)) => SyncEvent::Loaded {
                record,
                chat,
                source: LoadSource::Network,
            },
            Err(err) => {
                warn!("Initial fetch failed: {err:#}");
                match self.cache.as_ref().map(SnapshotCache::load) {
                    Some(Ok(Some(snapshot))) => {
                        info!(saved_at = %snapshot.saved_at, "Using cached game snapshot");
                        SyncEvent::Loaded {
                            record: snapshot.record,
                            chat: snapshot.chat,
                            source: LoadSource::Cache,
                        }
                    }
                    Some(Err(cache_err)) => {
                        warn!("Snapshot unreadable: {cache_err:#}");
                        SyncEvent::Unavailable(err.to_string())
                    }
                    Some(Ok(None)) | None => SyncEvent::Unavailable(err.to_string()),
                }
            }
        };
        let _ = self.sender.send(event).await;

        if let Some(realtime) = &self.realtime {
            realtime.connect();
        }
    }

    /// Run [`SyncHandle::load_initial`] on a background task.
    pub fn spawn_initial(&self) {
        let handle = self.clone();
        tokio::spawn(async move { handle.load_initial().await });
    }

    /// Refetch after the app regains focus and revive a dead subscription.
    pub async fn resume(&self) {
        match self.fetch_all().await {
            Ok((record, chat)) => {
                let _ = self.sender.send(SyncEvent::Refreshed { record, chat }).await;
            }
            Err(err) => warn!("Refresh failed: {err:#}"),
        }
        if let Some(realtime) = &self.realtime {
            realtime.ensure_connected();
        }
    }

    /// Run [`SyncHandle::resume`] on a background task.
    pub fn spawn_resume(&self) {
        let handle = self.clone();
        tokio::spawn(async move { handle.resume().await });
    }

    /// Write a move or new-game patch without waiting for the result.
    pub fn push_patch(&self, patch: GamePatch) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(err) = store.update_game(&patch).await {
                error!("Failed to write game update: {err}");
            }
        });
    }

    /// Post a chat message without waiting for the result.
    pub fn send_chat(&self, sender: &Identity, text: String) {
        let store = Arc::clone(&self.store);
        let message = NewChatMessage {
            game_id: self.game_id,
            sender: sender.as_str().to_string(),
            text,
        };
        tokio::spawn(async move {
            if let Err(err) = store.insert_chat(&message).await {
                error!("Failed to send chat message: {err}");
            }
        });
    }

    /// Delete the whole chat; the event loop clears its list on success.
    pub fn clear_chat(&self) {
        let store = Arc::clone(&self.store);
        let sender = self.sender.clone();
        tokio::spawn(async move {
            match store.clear_chat().await {
                Ok(()) => {
                    let _ = sender.send(SyncEvent::ChatCleared).await;
                }
                Err(err) => error!("Failed to clear chat: {err}"),
            }
        });
    }

    async fn fetch_all(&self) -> anyhow::Result<(GameRecord, Vec<ChatMessage>)> {
        let record = self.store.fetch_game().await?;
        let chat = match self.store.list_chat().await {
            Ok(chat) => chat,
            Err(err) => {
                warn!("Chat history unavailable: {err}");
                Vec::new()
            }
        };
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.store(&record, &chat) {
                warn!("Failed to write game snapshot: {err:#}");
            }
        }
        Ok((record, chat))
    }
}
