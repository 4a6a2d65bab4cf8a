//! Realtime change feed with auto-reconnect.
//!
//! Connects to the hosted database's realtime websocket, joins one Phoenix
//! channel configured for `postgres_changes` on a single table, and streams
//! parsed [`ChangeEvent`]s through a [`tokio::sync::broadcast`] channel.
//! Reconnection uses exponential backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use librohub_api::realtime::{ChannelSpec, RealtimeHandle, ReconnectConfig, realtime_url};
//! use librohub_api::Table;
//! use tokio_util::sync::CancellationToken;
//!
//! let url = realtime_url("https://abc.example.co", &api_key)?;
//! let handle = RealtimeHandle::connect(
//!     url,
//!     ChannelSpec::new("books_changes", Table::Books),
//!     ReconnectConfig::default(),
//!     CancellationToken::new(),
//! );
//! let mut rx = handle.subscribe();
//! while let Ok(change) = rx.recv().await {
//!     println!("{} {}", change.kind, change.table);
//! }
//! handle.close().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{Display, EnumString};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::query::Table;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const PROTOCOL_VSN: &str = "1.0.0";

// ── ChangeEvent ──────────────────────────────────────────────────────

/// Kind of row change reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single row change on a subscribed table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// New row image (empty object for deletes).
    pub record: Value,
    /// Previous row image; only primary keys unless replica identity is full.
    pub old_record: Value,
    pub commit_timestamp: Option<String>,
}

// ── Channel & reconnect config ───────────────────────────────────────

/// One channel joined on the socket: a topic name and the table it watches.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub name: String,
    pub table: Table,
}

impl ChannelSpec {
    pub fn new(name: impl Into<String>, table: Table) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }

    fn topic(&self) -> String {
        format!("realtime:{}", self.name)
    }
}

/// Exponential backoff configuration for websocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Derive the websocket endpoint from the project URL.
///
/// `https://host` becomes `wss://host/realtime/v1/websocket?apikey=…&vsn=1.0.0`.
pub fn realtime_url(project_url: &str, api_key: &SecretString) -> Result<Url, Error> {
    let mut url = Url::parse(project_url)?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|()| Error::RealtimeConnect(format!("cannot use {scheme} for {project_url}")))?;

    let base = url.path().trim_end_matches('/').to_owned();
    url.set_path(&format!("{base}/realtime/v1/websocket"));
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", api_key.expose_secret())
        .append_pair("vsn", PROTOCOL_VSN);
    Ok(url)
}

// ── RealtimeHandle ───────────────────────────────────────────────────

/// Handle to a running change-feed subscription.
///
/// Call [`close`](Self::close) to leave the channel and join the
/// background task.
pub struct RealtimeHandle {
    event_rx: broadcast::Receiver<Arc<ChangeEvent>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RealtimeHandle {
    /// Spawn the connection loop for one channel.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background.
    pub fn connect(
        ws_url: Url,
        channel: ChannelSpec,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            ws_loop(ws_url, channel, event_tx, reconnect, task_cancel).await;
        });

        Self {
            event_rx,
            cancel,
            task,
        }
    }

    /// Get a new broadcast receiver for the change stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChangeEvent>> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down without waiting.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Shut down and wait for the background task to exit.
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "realtime task ended abnormally");
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → join → read → on error, backoff → reconnect.
async fn ws_loop(
    ws_url: Url,
    channel: ChannelSpec,
    event_tx: broadcast::Sender<Arc<ChangeEvent>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &channel, &event_tx, &cancel) => {
                match result {
                    Ok(()) if cancel.is_cancelled() => break,
                    Ok(()) => {
                        tracing::info!(topic = %channel.topic(), "realtime disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, topic = %channel.topic(), "realtime error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "realtime reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt = attempt.saturating_add(1);
                    }
                }
            }
        }
    }

    tracing::debug!(topic = %channel.topic(), "realtime loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Phoenix channel frame.
#[derive(Debug, Serialize, Deserialize)]
struct PhxMessage {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    msg_ref: Option<String>,
}

impl PhxMessage {
    fn new(topic: impl Into<String>, event: &str, payload: Value, msg_ref: u64) -> Self {
        Self {
            topic: topic.into(),
            event: event.to_owned(),
            payload,
            msg_ref: Some(msg_ref.to_string()),
        }
    }

    fn into_frame(self) -> Result<Message, Error> {
        let text = serde_json::to_string(&self).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })?;
        Ok(Message::text(text))
    }
}

fn join_message(channel: &ChannelSpec, msg_ref: u64) -> PhxMessage {
    PhxMessage::new(
        channel.topic(),
        "phx_join",
        json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "*",
                    "schema": "public",
                    "table": channel.table.as_ref(),
                }],
            }
        }),
        msg_ref,
    )
}

/// Establish a single connection, join the channel, read until it drops.
async fn connect_and_read(
    url: &Url,
    channel: &ChannelSpec,
    event_tx: &broadcast::Sender<Arc<ChangeEvent>>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(topic = %channel.topic(), "connecting to realtime");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::RealtimeConnect(e.to_string()))?;

    let (mut write, mut read) = ws_stream.split();
    let mut next_ref: u64 = 1;

    write
        .send(join_message(channel, next_ref).into_frame()?)
        .await
        .map_err(|e| Error::RealtimeConnect(e.to_string()))?;

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                next_ref += 1;
                let leave = PhxMessage::new(channel.topic(), "phx_leave", json!({}), next_ref);
                if let Ok(frame) = leave.into_frame() {
                    let _ = write.send(frame).await;
                }
                let _ = write.close().await;
                return Ok(());
            }
            _ = heartbeat.tick() => {
                next_ref += 1;
                let beat = PhxMessage::new("phoenix", "heartbeat", json!({}), next_ref);
                write
                    .send(beat.into_frame()?)
                    .await
                    .map_err(|e| Error::RealtimeConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match decode_frame(&text, channel) {
                        Some(Frame::Change(change)) => {
                            // No receivers right now is fine.
                            let _ = event_tx.send(Arc::new(change));
                        }
                        Some(Frame::JoinOk) => {
                            tracing::info!(topic = %channel.topic(), "realtime channel joined");
                        }
                        Some(Frame::JoinRejected(reason)) => {
                            return Err(Error::ChannelJoin { topic: channel.topic(), reason });
                        }
                        Some(Frame::Errored) => {
                            return Err(Error::ChannelError { topic: channel.topic() });
                        }
                        Some(Frame::Closed) => {
                            tracing::info!(topic = %channel.topic(), "realtime channel closed by server");
                            return Ok(());
                        }
                        None => {}
                    },
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "realtime close frame received");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => return Err(Error::RealtimeConnect(e.to_string())),
                    None => {
                        tracing::info!("realtime stream ended");
                        return Ok(());
                    }
                    // Ping/Pong/Binary: tungstenite answers pings itself.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

// ── Frame decoding ───────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum Frame {
    Change(ChangeEvent),
    JoinOk,
    JoinRejected(String),
    Errored,
    Closed,
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    table: String,
    #[serde(rename = "type")]
    kind: ChangeKind,
    #[serde(default)]
    record: Value,
    #[serde(default)]
    old_record: Value,
    #[serde(default)]
    commit_timestamp: Option<String>,
}

/// Decode a text frame addressed to `channel`. Frames for other topics,
/// heartbeat replies and malformed JSON yield `None`.
fn decode_frame(text: &str, channel: &ChannelSpec) -> Option<Frame> {
    let msg: PhxMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse realtime frame");
            return None;
        }
    };

    if msg.topic != channel.topic() {
        return None;
    }

    match msg.event.as_str() {
        "phx_reply" if msg.msg_ref.as_deref() == Some("1") => {
            if msg.payload["status"] == "ok" {
                Some(Frame::JoinOk)
            } else {
                let reason = msg.payload["response"]["reason"]
                    .as_str()
                    .unwrap_or("unknown")
                    .to_owned();
                Some(Frame::JoinRejected(reason))
            }
        }
        "phx_close" => Some(Frame::Closed),
        "phx_error" => Some(Frame::Errored),
        "postgres_changes" => {
            let payload: ChangePayload = match serde_json::from_value(msg.payload) {
                Ok(p) => p,
                Err(e) => {
                    tracing::debug!(error = %e, "malformed postgres_changes payload");
                    return None;
                }
            };
            let table = payload.data.table.parse::<Table>().ok()?;
            Some(Frame::Change(ChangeEvent {
                table,
                kind: payload.data.kind,
                record: payload.data.record,
                old_record: payload.data.old_record,
                commit_timestamp: payload.data.commit_timestamp,
            }))
        }
        _ => None,
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exp = i32::try_from(attempt.min(31)).unwrap_or(31);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exp);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn books_channel() -> ChannelSpec {
        ChannelSpec::new("books_changes", Table::Books)
    }

    #[test]
    fn realtime_url_switches_scheme_and_adds_params() {
        let key = SecretString::from("anon".to_string());
        let url = realtime_url("https://abc.example.co", &key).expect("valid url");
        assert_eq!(
            url.as_str(),
            "wss://abc.example.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );

        let local = realtime_url("http://localhost:54321/", &key).expect("valid url");
        assert_eq!(local.scheme(), "ws");
        assert_eq!(local.path(), "/realtime/v1/websocket");
    }

    #[test]
    fn join_message_targets_table() {
        let msg = join_message(&books_channel(), 1);
        assert_eq!(msg.topic, "realtime:books_changes");
        assert_eq!(msg.event, "phx_join");
        assert_eq!(
            msg.payload["config"]["postgres_changes"][0]["table"],
            "books"
        );
        assert_eq!(msg.msg_ref.as_deref(), Some("1"));
    }

    #[test]
    fn decodes_postgres_change() {
        let raw = json!({
            "topic": "realtime:books_changes",
            "event": "postgres_changes",
            "ref": null,
            "payload": {
                "data": {
                    "schema": "public",
                    "table": "books",
                    "type": "UPDATE",
                    "commit_timestamp": "2026-01-05T10:00:00Z",
                    "record": { "book_id": "b-1", "availability_status": false },
                    "old_record": { "book_id": "b-1" }
                },
                "ids": [1]
            }
        });

        let change = match decode_frame(&raw.to_string(), &books_channel()) {
            Some(Frame::Change(change)) => change,
            other => panic!("expected a change frame, got {other:?}"),
        };
        assert_eq!(change.table, Table::Books);
        assert_eq!(change.kind, ChangeKind::Update);
        assert_eq!(change.record["availability_status"], false);
        assert_eq!(change.commit_timestamp.as_deref(), Some("2026-01-05T10:00:00Z"));
    }

    #[test]
    fn join_reply_ok_and_error() {
        let ok = json!({
            "topic": "realtime:books_changes", "event": "phx_reply", "ref": "1",
            "payload": { "status": "ok", "response": {} }
        });
        assert_eq!(decode_frame(&ok.to_string(), &books_channel()), Some(Frame::JoinOk));

        let err = json!({
            "topic": "realtime:books_changes", "event": "phx_reply", "ref": "1",
            "payload": { "status": "error", "response": { "reason": "unauthorized" } }
        });
        assert_eq!(
            decode_frame(&err.to_string(), &books_channel()),
            Some(Frame::JoinRejected("unauthorized".into()))
        );
    }

    #[test]
    fn server_close_and_channel_error_are_distinct() {
        let close = json!({
            "topic": "realtime:books_changes", "event": "phx_close", "ref": null, "payload": {}
        });
        assert_eq!(decode_frame(&close.to_string(), &books_channel()), Some(Frame::Closed));

        let crashed = json!({
            "topic": "realtime:books_changes", "event": "phx_error", "ref": null, "payload": {}
        });
        assert_eq!(decode_frame(&crashed.to_string(), &books_channel()), Some(Frame::Errored));
        assert!(Error::ChannelError { topic: books_channel().topic() }.is_transient());
    }

    #[test]
    fn heartbeat_replies_and_foreign_topics_are_ignored() {
        let heartbeat = json!({
            "topic": "phoenix", "event": "phx_reply", "ref": "2",
            "payload": { "status": "ok", "response": {} }
        });
        assert_eq!(decode_frame(&heartbeat.to_string(), &books_channel()), None);

        let other = json!({
            "topic": "realtime:members_changes", "event": "phx_close", "ref": null, "payload": {}
        });
        assert_eq!(decode_frame(&other.to_string(), &books_channel()), None);
    }

    #[test]
    fn malformed_frames_are_skipped() {
        assert_eq!(decode_frame("not json at all", &books_channel()), None);
    }

    #[test]
    fn backoff_increases_then_caps() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d0 = calculate_backoff(0, &config);
        let d2 = calculate_backoff(2, &config);
        assert!(d2 > d0, "d2 ({d2:?}) should exceed d0 ({d0:?})");

        let d10 = calculate_backoff(10, &config);
        assert!(d10 <= Duration::from_millis(12_500), "{d10:?} should stay near max_delay");
    }
}
