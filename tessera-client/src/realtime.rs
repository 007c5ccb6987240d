//! Server-sent-event change feeds with reconnect backoff.
//!
//! Each feed owns one event-stream connection to `/api/realtime`:
//!
//! 1. `GET /api/realtime` opens the stream; the first `PB_CONNECT` event
//!    carries the client id.
//! 2. `POST /api/realtime {clientId, subscriptions}` registers the topic.
//! 3. Events named after the topic carry `{action, record}`.
//!
//! When the stream drops, the feed reconnects with jittered exponential
//! backoff and registers the topic again. Dropping the feed stops the task.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde_json::{json, Value};
use tessera_core::{ChangeEvent, Failure};
use tessera_storage::ChangeFeed;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};

use crate::auth::AuthStore;
use crate::config::ReconnectConfig;
use crate::http::{check_status, transport_failure};

/// Event that opens every stream and names the client.
pub const CONNECT_EVENT: &str = "PB_CONNECT";

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// Incremental `text/event-stream` parser.
///
/// Bytes are buffered until a full line is available, so chunk boundaries
/// may fall anywhere, including inside a multi-byte character.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(end) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
            if let Some(event) = self.line(line) {
                events.push(event);
            }
        }
        events
    }

    fn line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
            id,
        })
    }
}

/// Exponential backoff with additive jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    current_ms: u64,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        let current_ms = config.initial_ms;
        Self { config, current_ms }
    }

    /// Delay before the next attempt; grows the base for the one after.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_ms.saturating_add(jitter(self.config.jitter_ms));
        let grown = (self.current_ms as f64 * self.config.multiplier) as u64;
        self.current_ms = grown.min(self.config.max_ms).max(self.config.initial_ms);
        Duration::from_millis(delay)
    }

    pub fn reset(&mut self) {
        self.current_ms = self.config.initial_ms;
    }
}

fn jitter(jitter_ms: u64) -> u64 {
    if jitter_ms == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    nanos % jitter_ms
}

type ByteStream = BoxStream<'static, Result<Vec<u8>, reqwest::Error>>;

/// An open event stream.
struct Connection {
    client_id: String,
    body: ByteStream,
    parser: SseParser,
    pending: VecDeque<SseEvent>,
}

impl Connection {
    /// Next event, `None` once the stream ends.
    async fn next_event(&mut self) -> Option<Result<SseEvent, Failure>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            match self.body.next().await? {
                Ok(chunk) => self.pending.extend(self.parser.push(&chunk)),
                Err(err) => return Some(Err(transport_failure(err))),
            }
        }
    }
}

/// Opens change feeds against one realtime endpoint.
#[derive(Clone)]
pub struct RealtimeConnector {
    client: reqwest::Client,
    url: Url,
    auth: AuthStore,
    reconnect: ReconnectConfig,
}

impl RealtimeConnector {
    pub fn new(client: reqwest::Client, url: Url, auth: AuthStore, reconnect: ReconnectConfig) -> Self {
        Self {
            client,
            url,
            auth,
            reconnect,
        }
    }

    /// Connect, register `topic` and return its feed.
    ///
    /// Failures of the first connection are returned; later disconnects are
    /// retried in the background.
    pub async fn open_feed(&self, topic: String) -> Result<ChangeFeed, Failure> {
        let connection = self.open(&topic).await?;
        debug!(topic = %topic, client_id = %connection.client_id, "realtime feed opened");

        let (sender, receiver) = unbounded_channel();
        tokio::spawn(self.clone().pump(connection, topic, sender));
        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }

    async fn open(&self, topic: &str) -> Result<Connection, Failure> {
        let connection = self.connect().await?;
        self.register(&connection.client_id, topic).await?;
        Ok(connection)
    }

    async fn connect(&self) -> Result<Connection, Failure> {
        let response = self
            .auth
            .apply(self.client.get(self.url.clone()))
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(transport_failure)?;
        let response = check_status(response).await?;

        let mut connection = Connection {
            client_id: String::new(),
            body: response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .boxed(),
            parser: SseParser::new(),
            pending: VecDeque::new(),
        };

        loop {
            match connection.next_event().await {
                Some(Ok(event)) if event.event == CONNECT_EVENT => {
                    connection.client_id = client_id(&event)
                        .ok_or_else(|| Failure::other("realtime connect event without client id"))?;
                    return Ok(connection);
                }
                Some(Ok(_)) => continue,
                Some(Err(failure)) => return Err(failure),
                None => return Err(Failure::transport("realtime stream closed before connect")),
            }
        }
    }

    async fn register(&self, client_id: &str, topic: &str) -> Result<(), Failure> {
        let response = self
            .auth
            .apply(self.client.post(self.url.clone()))
            .json(&json!({ "clientId": client_id, "subscriptions": [topic] }))
            .send()
            .await
            .map_err(transport_failure)?;
        check_status(response).await?;
        Ok(())
    }

    async fn pump(
        self,
        mut connection: Connection,
        topic: String,
        sender: UnboundedSender<ChangeEvent<Value>>,
    ) {
        let mut backoff = Backoff::new(self.reconnect.clone());
        loop {
            loop {
                let next = tokio::select! {
                    _ = sender.closed() => return,
                    next = connection.next_event() => next,
                };
                match next {
                    Some(Ok(event)) if event.event == topic => match decode_change(&event.data) {
                        Ok(change) => {
                            if sender.send(change).is_err() {
                                return;
                            }
                        }
                        Err(err) => warn!(topic = %topic, error = %err, "undecodable realtime event"),
                    },
                    Some(Ok(_)) => {}
                    Some(Err(failure)) => {
                        warn!(topic = %topic, error = %failure, "realtime stream failed");
                        break;
                    }
                    None => break,
                }
            }

            connection = loop {
                let delay = backoff.next_delay();
                debug!(topic = %topic, delay_ms = delay.as_millis() as u64, "realtime reconnecting");
                tokio::select! {
                    _ = sender.closed() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                match self.open(&topic).await {
                    Ok(connection) => {
                        backoff.reset();
                        debug!(topic = %topic, "realtime feed resubscribed");
                        break connection;
                    }
                    Err(failure) => warn!(topic = %topic, error = %failure, "realtime reconnect failed"),
                }
            };
        }
    }
}

fn client_id(event: &SseEvent) -> Option<String> {
    serde_json::from_str::<Value>(&event.data)
        .ok()
        .and_then(|data| data.get("clientId").and_then(Value::as_str).map(str::to_string))
        .or_else(|| event.id.clone())
        .filter(|id| !id.is_empty())
}

fn decode_change(data: &str) -> Result<ChangeEvent<Value>, serde_json::Error> {
    serde_json::from_str(data)
}
