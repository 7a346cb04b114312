use std::{
    io,
    net::TcpStream,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tungstenite::{stream::MaybeTlsStream, Message, WebSocket};
use url::Url;

use super::{BackendError, CHAT_TABLE, GAME_TABLE};
use crate::{
    config::AppConfig,
    models::{ChatMessage, GameRecord},
};

const CHANNEL_TOPIC: &str = "realtime:chess_game";
const PHOENIX_TOPIC: &str = "phoenix";
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// State of the change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Socket opening or join sent.
    Connecting,
    /// Channel joined; changes are flowing.
    Joined,
    /// Socket closed.
    Closed,
    /// Socket or join failed.
    Errored,
}

/// Change notifications forwarded to the event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    /// The shared game row changed.
    GameUpdated(GameRecord),
    /// A chat message was inserted.
    ChatInserted(ChatMessage),
    /// A chat message was deleted.
    ChatDeleted(i64),
    /// The subscription changed state.
    Status(ConnectionStatus),
}

/// Keep-alive bookkeeping; a heartbeat still unanswered when the next one is
/// due means the socket is dead.
#[derive(Debug)]
struct Heartbeat {
    interval: Duration,
    last_sent: Instant,
    pending: Option<String>,
}

impl Heartbeat {
    fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last_sent: now,
            pending: None,
        }
    }

    /// Ref to send as the next heartbeat, if one is due.
    fn poll(&mut self, now: Instant, msg_ref: u64) -> Result<Option<String>, BackendError> {
        if now.duration_since(self.last_sent) < self.interval {
            return Ok(None);
        }
        if let Some(missed) = self.pending.take() {
            return Err(BackendError::Realtime(format!(
                "heartbeat {missed} was not answered"
            )));
        }
        let msg_ref = msg_ref.to_string();
        self.pending = Some(msg_ref.clone());
        self.last_sent = now;
        Ok(Some(msg_ref))
    }

    fn ack(&mut self, msg_ref: &str) {
        if self.pending.as_deref() == Some(msg_ref) {
            self.pending = None;
        }
    }
}

#[derive(Debug)]
struct Shared {
    status: ConnectionStatus,
    generation: u64,
}

/// Phoenix-channel subscription running on a dedicated thread.
///
/// The socket can die silently; an unanswered heartbeat marks the
/// connection errored, and [`Realtime::ensure_connected`] then starts a new
/// one. Older connection threads notice the generation change and exit.
#[derive(Debug, Clone)]
pub struct Realtime {
    url: Url,
    api_key: String,
    game_id: i64,
    heartbeat: Duration,
    shared: Arc<Mutex<Shared>>,
    sender: mpsc::Sender<RemoteEvent>,
}

impl Realtime {
    /// Subscription for the configured game; nothing connects until [`Realtime::connect`].
    pub fn new(config: &AppConfig, sender: mpsc::Sender<RemoteEvent>) -> Result<Self, BackendError> {
        Ok(Self {
            url: socket_url(&config.backend_url, &config.api_key)?,
            api_key: config.api_key.clone(),
            game_id: config.game_id,
            heartbeat: Duration::from_secs(config.realtime_heartbeat_secs),
            shared: Arc::new(Mutex::new(Shared {
                status: ConnectionStatus::Closed,
                generation: 0,
            })),
            sender,
        })
    }

    /// Current subscription state.
    pub fn status(&self) -> ConnectionStatus {
        self.shared.lock().status
    }

    /// Open a new connection, superseding any previous one.
    pub fn connect(&self) {
        let generation = {
            let mut shared = self.shared.lock();
            shared.generation += 1;
            shared.status = ConnectionStatus::Connecting;
            shared.generation
        };
        let worker = self.clone();
        thread::spawn(move || worker.run(generation));
    }

    /// Reconnect unless the channel is joined or still connecting.
    ///
    /// Returns `true` when a new connection was started.
    pub fn ensure_connected(&self) -> bool {
        match self.status() {
            ConnectionStatus::Joined | ConnectionStatus::Connecting => false,
            ConnectionStatus::Closed | ConnectionStatus::Errored => {
                info!("Reconnecting realtime channel");
                self.connect();
                true
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.shared.lock().generation == generation
    }

    fn set_status(&self, generation: u64, status: ConnectionStatus) {
        {
            let mut shared = self.shared.lock();
            if shared.generation != generation || shared.status == status {
                return;
            }
            shared.status = status;
        }
        debug!(?status, "Realtime status changed");
        let _ = self.sender.blocking_send(RemoteEvent::Status(status));
    }

    fn run(self, generation: u64) {
        self.set_status(generation, ConnectionStatus::Connecting);
        match self.session(generation) {
            Ok(()) => self.set_status(generation, ConnectionStatus::Closed),
            Err(err) => {
                error!("Realtime connection failed: {err}");
                self.set_status(generation, ConnectionStatus::Errored);
            }
        }
    }

    fn session(&self, generation: u64) -> Result<(), BackendError> {
        let (mut socket, _) =
            tungstenite::connect(self.url.as_str()).map_err(|err| BackendError::Realtime(err.to_string()))?;
        set_read_timeout(&socket, READ_TIMEOUT)
            .map_err(|err| BackendError::Realtime(err.to_string()))?;

        let mut next_ref = 1u64;
        send_json(&mut socket, &join_message(self.game_id, &self.api_key, next_ref))?;
        let join_ref = next_ref.to_string();
        let mut heartbeat = Heartbeat::new(self.heartbeat, Instant::now());

        loop {
            if !self.is_current(generation) || self.sender.is_closed() {
                let _ = socket.close(None);
                return Ok(());
            }
            if heartbeat.poll(Instant::now(), next_ref + 1)?.is_some() {
                next_ref += 1;
                send_json(&mut socket, &heartbeat_message(next_ref))?;
            }

            let message = match socket.read() {
                Ok(message) => message,
                Err(tungstenite::Error::Io(err))
                    if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(tungstenite::Error::ConnectionClosed) => return Ok(()),
                Err(err) => return Err(BackendError::Realtime(err.to_string())),
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => return Ok(()),
                _ => continue,
            };

            match parse_frame(text.as_str(), &join_ref) {
                Some(Frame::Joined) => self.set_status(generation, ConnectionStatus::Joined),
                Some(Frame::JoinRejected(reason)) => {
                    return Err(BackendError::Realtime(format!("join rejected: {reason}")));
                }
                Some(Frame::HeartbeatAck(msg_ref)) => heartbeat.ack(&msg_ref),
                Some(Frame::ChannelClosed) => return Ok(()),
                Some(Frame::Event(event)) => {
                    if self.sender.blocking_send(event).is_err() {
                        return Ok(());
                    }
                }
                None => {}
            }
        }
    }
}

fn set_read_timeout(socket: &WebSocket<MaybeTlsStream<TcpStream>>, timeout: Duration) -> io::Result<()> {
    match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream.set_read_timeout(Some(timeout)),
        MaybeTlsStream::NativeTls(stream) => stream.get_ref().set_read_timeout(Some(timeout)),
        _ => Ok(()),
    }
}

fn send_json(
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
    value: &Value,
) -> Result<(), BackendError> {
    socket
        .send(Message::text(value.to_string()))
        .map_err(|err| BackendError::Realtime(err.to_string()))
}

/// Websocket endpoint derived from the REST base URL.
pub fn socket_url(backend_url: &str, api_key: &str) -> Result<Url, BackendError> {
    let mut url = Url::parse(backend_url)
        .map_err(|err| BackendError::Realtime(format!("invalid backend url: {err}")))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|()| BackendError::Realtime("cannot derive websocket scheme".to_string()))?;
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", api_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

/// `phx_join` subscribing to the game row and its chat.
pub fn join_message(game_id: i64, api_key: &str, msg_ref: u64) -> Value {
    let chat_filter = format!("game_id=eq.{game_id}");
    json!({
        "topic": CHANNEL_TOPIC,
        "event": "phx_join",
        "ref": msg_ref.to_string(),
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "UPDATE", "schema": "public", "table": GAME_TABLE, "filter": format!("id=eq.{game_id}") },
                    { "event": "INSERT", "schema": "public", "table": CHAT_TABLE, "filter": chat_filter },
                    { "event": "DELETE", "schema": "public", "table": CHAT_TABLE, "filter": chat_filter },
                ]
            },
            "access_token": api_key,
        }
    })
}

/// Keep-alive frame.
pub fn heartbeat_message(msg_ref: u64) -> Value {
    json!({
        "topic": PHOENIX_TOPIC,
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
}

/// Decoded server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Reply to our join with status ok.
    Joined,
    /// Reply to our join with an error.
    JoinRejected(String),
    /// Reply to a heartbeat.
    HeartbeatAck(String),
    /// The server closed or errored the channel.
    ChannelClosed,
    /// A change notification.
    Event(RemoteEvent),
}

/// Decode one text frame; unrelated frames yield `None`.
pub fn parse_frame(text: &str, join_ref: &str) -> Option<Frame> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            warn!("Ignoring malformed realtime frame: {err}");
            return None;
        }
    };
    let topic = value.get("topic")?.as_str()?;
    let event = value.get("event")?.as_str()?;
    if topic == PHOENIX_TOPIC && event == "phx_reply" {
        let msg_ref = value.get("ref")?.as_str()?;
        return Some(Frame::HeartbeatAck(msg_ref.to_string()));
    }
    if topic != CHANNEL_TOPIC {
        return None;
    }
    let payload = value.get("payload")?;

    match event {
        "phx_reply" => {
            if value.get("ref").and_then(Value::as_str) != Some(join_ref) {
                return None;
            }
            match payload.get("status").and_then(Value::as_str) {
                Some("ok") => Some(Frame::Joined),
                _ => Some(Frame::JoinRejected(
                    payload
                        .get("response")
                        .map(Value::to_string)
                        .unwrap_or_default(),
                )),
            }
        }
        "phx_close" | "phx_error" => Some(Frame::ChannelClosed),
        "postgres_changes" => parse_change(payload.get("data")?).map(Frame::Event),
        _ => None,
    }
}

fn parse_change(data: &Value) -> Option<RemoteEvent> {
    let table = data.get("table")?.as_str()?;
    let kind = data.get("type").or_else(|| data.get("eventType"))?.as_str()?;
    match (table, kind) {
        (GAME_TABLE, "UPDATE") => {
            let record = serde_json::from_value(data.get("record")?.clone()).ok()?;
            Some(RemoteEvent::GameUpdated(record))
        }
        (CHAT_TABLE, "INSERT") => {
            let message = serde_json::from_value(data.get("record")?.clone()).ok()?;
            Some(RemoteEvent::ChatInserted(message))
        }
        (CHAT_TABLE, "DELETE") => {
            let id = data.get("old_record")?.get("id")?.as_i64()?;
            Some(RemoteEvent::ChatDeleted(id))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_url_from_backend_url() -> Result<(), BackendError> {
        let url = socket_url("https://db.example.test", "key123")?;
        assert_eq!(
            url.as_str(),
            "wss://db.example.test/realtime/v1/websocket?apikey=key123&vsn=1.0.0"
        );
        let url = socket_url("http://localhost:54321", "k")?;
        assert_eq!(url.scheme(), "ws");
        assert!(socket_url("not a url", "k").is_err());
        Ok(())
    }

    #[test]
    fn join_subscribes_to_game_and_chat() {
        let join = join_message(7, "key", 1);
        assert_eq!(join["event"], "phx_join");
        let changes = join["payload"]["config"]["postgres_changes"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0]["filter"], "id=eq.7");
        assert_eq!(changes[1]["filter"], "game_id=eq.7");
        assert_eq!(heartbeat_message(2)["topic"], "phoenix");
    }

    #[test]
    fn parses_join_reply_and_changes() {
        let reply = r#"{"topic":"realtime:chess_game","event":"phx_reply","ref":"1","payload":{"status":"ok","response":{}}}"#;
        assert_eq!(parse_frame(reply, "1"), Some(Frame::Joined));
        assert_eq!(parse_frame(reply, "2"), None);

        let update = r#"{"topic":"realtime:chess_game","event":"postgres_changes","ref":null,
            "payload":{"data":{"table":"chess_state","type":"UPDATE",
            "record":{"id":1,"pgn":"1. e4","last_move":"e2-e4","white_time":1000}}}}"#;
        match parse_frame(update, "1") {
            Some(Frame::Event(RemoteEvent::GameUpdated(record))) => {
                assert_eq!(record.pgn.as_deref(), Some("1. e4"));
                assert_eq!(record.white_time, Some(1000));
                assert_eq!(record.black_time, None);
            }
            other => panic!("unexpected frame {other:?}"),
        }

        let delete = r#"{"topic":"realtime:chess_game","event":"postgres_changes",
            "payload":{"data":{"table":"chess_chat","type":"DELETE","old_record":{"id":42}}}}"#;
        assert_eq!(
            parse_frame(delete, "1"),
            Some(Frame::Event(RemoteEvent::ChatDeleted(42)))
        );

        let heartbeat = r#"{"topic":"phoenix","event":"phx_reply","ref":"2","payload":{"status":"ok"}}"#;
        assert_eq!(
            parse_frame(heartbeat, "1"),
            Some(Frame::HeartbeatAck("2".to_string()))
        );
        assert_eq!(parse_frame("{oops", "1"), None);
    }

    #[test]
    fn unanswered_heartbeat_fails_the_connection() {
        let start = Instant::now();
        let interval = Duration::from_secs(30);
        let mut heartbeat = Heartbeat::new(interval, start);

        assert!(matches!(heartbeat.poll(start + Duration::from_secs(5), 2), Ok(None)));
        assert!(matches!(
            heartbeat.poll(start + interval, 2),
            Ok(Some(msg_ref)) if msg_ref == "2"
        ));
        heartbeat.ack("2");
        assert!(matches!(
            heartbeat.poll(start + interval * 2, 3),
            Ok(Some(msg_ref)) if msg_ref == "3"
        ));
        heartbeat.ack("1");
        assert!(matches!(
            heartbeat.poll(start + interval * 3, 4),
            Err(BackendError::Realtime(_))
        ));
    }

    #[test]
    fn chat_insert_frame() {
        let insert = r#"{"topic":"realtime:chess_game","event":"postgres_changes",
            "payload":{"data":{"table":"chess_chat","type":"INSERT",
            "record":{"id":5,"game_id":1,"sender":"Sanaa","text":"gg","created_at":"2024-05-01T10:00:00Z"}}}}"#;
        match parse_frame(insert, "1") {
            Some(Frame::Event(RemoteEvent::ChatInserted(message))) => {
                assert_eq!(message.id, 5);
                assert_eq!(message.text, "gg");
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn new_subscription_starts_closed() -> Result<(), BackendError> {
        let (tx, _rx) = mpsc::channel(4);
        let realtime = Realtime::new(&AppConfig::default(), tx)?;
        assert_eq!(realtime.status(), ConnectionStatus::Closed);
        Ok(())
    }
}
