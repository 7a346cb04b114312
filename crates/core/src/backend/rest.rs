use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::debug;

use super::{BackendError, GameStore, CHAT_TABLE, GAME_TABLE};
use crate::{
    config::AppConfig,
    models::{ChatMessage, GamePatch, GameRecord, NewChatMessage},
};

const MAX_ERROR_BODY: usize = 512;

/// [`GameStore`] over the backend's REST interface.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
    game_id: i64,
}

impl RestStore {
    /// Build a store from configuration.
    pub fn new(config: &AppConfig) -> Result<Self, BackendError> {
        let client = Client::builder().gzip(true).build()?;
        Ok(Self {
            client,
            base_url: config.backend_url.clone(),
            api_key: config.api_key.clone(),
            game_id: config.game_id,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn game_filter(&self) -> String {
        format!("eq.{}", self.game_id)
    }
}

async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body: clip_body(body),
    })
}

fn clip_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

#[async_trait]
impl GameStore for RestStore {
    async fn fetch_game(&self) -> Result<GameRecord, BackendError> {
        let response = self
            .request(Method::GET, GAME_TABLE)
            .query(&[("id", self.game_filter().as_str()), ("select", "*")])
            .send()
            .await?;
        let rows: Vec<GameRecord> = ensure_success(response).await?.json().await?;
        debug!(rows = rows.len(), "Fetched game row");
        rows.into_iter()
            .next()
            .ok_or(BackendError::NotFound(self.game_id))
    }

    async fn update_game(&self, patch: &GamePatch) -> Result<(), BackendError> {
        let response = self
            .request(Method::PATCH, GAME_TABLE)
            .query(&[("id", self.game_filter())])
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn list_chat(&self) -> Result<Vec<ChatMessage>, BackendError> {
        let response = self
            .request(Method::GET, CHAT_TABLE)
            .query(&[
                ("game_id", self.game_filter().as_str()),
                ("select", "*"),
                ("order", "created_at.asc"),
            ])
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn insert_chat(&self, message: &NewChatMessage) -> Result<(), BackendError> {
        let response = self
            .request(Method::POST, CHAT_TABLE)
            .header("Prefer", "return=minimal")
            .json(message)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn clear_chat(&self) -> Result<(), BackendError> {
        let response = self
            .request(Method::DELETE, CHAT_TABLE)
            .query(&[("game_id", self.game_filter())])
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_and_filters() -> Result<(), BackendError> {
        let config = AppConfig {
            backend_url: "https://db.example.test".to_string(),
            game_id: 3,
            ..AppConfig::default()
        };
        let store = RestStore::new(&config)?;
        assert_eq!(
            store.table_url(GAME_TABLE),
            "https://db.example.test/rest/v1/chess_state"
        );
        assert_eq!(store.game_filter(), "eq.3");
        Ok(())
    }

    #[tokio::test]
    async fn error_body_is_clipped_on_char_boundary() {
        let body = format!("{}é{}", "x".repeat(MAX_ERROR_BODY - 1), "y".repeat(100));
        let response = http::Response::builder()
            .status(500)
            .body(body)
            .expect("valid response");
        match ensure_success(Response::from(response)).await {
            Err(BackendError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "x".repeat(MAX_ERROR_BODY - 1));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn short_error_body_is_kept() {
        assert_eq!(clip_body("née".to_string()), "née");
    }
}
