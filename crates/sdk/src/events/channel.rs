// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The events channel itself: one supervisor task that dials, serves a
//! connection with split reader/writer tasks, and reconnects with
//! jittered backoff until closed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Backoff, EventMessage};

/// Events endpoint, relative to the server base URL.
pub const EVENTS_PATH: &str = "/api/v1/events";

/// Bounded capacity of both the send and receive queues.
const QUEUE_CAPACITY: usize = 256;
const PING_INTERVAL: Duration = Duration::from_secs(15);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_BASE: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(8);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Events channel errors.
#[derive(Debug, thiserror::Error)]
pub enum EventsError {
    #[error("events channel not connected")]
    NotConnected,

    #[error("events message queue full")]
    QueueFull,

    #[error("websocket connect failed: {0}")]
    Handshake(String),
}

/// Duplex events connection with automatic reconnection.
///
/// `send` enqueues without blocking and drops at the producer when the
/// outgoing queue is full; incoming frames that find the receive queue
/// full are dropped with a warning.
#[derive(Debug)]
pub struct EventsChannel {
    ws_url: String,
    access_token: Option<String>,
    tx_queue: mpsc::Sender<EventMessage>,
    /// Writer side of each connection drains this shared receiver.
    tx_shared: Arc<tokio::sync::Mutex<mpsc::Receiver<EventMessage>>>,
    rx_tx: mpsc::Sender<EventMessage>,
    rx_queue: Mutex<Option<mpsc::Receiver<EventMessage>>>,
    connected: AtomicBool,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl EventsChannel {
    pub fn new(base_url: &Url, access_token: Option<String>) -> Result<Self, EventsError> {
        let ws_url = ws_url(base_url)?;
        let (tx_queue, tx_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (rx_tx, rx_queue) = mpsc::channel(QUEUE_CAPACITY);
        Ok(Self {
            ws_url,
            access_token,
            tx_queue,
            tx_shared: Arc::new(tokio::sync::Mutex::new(tx_rx)),
            rx_tx,
            rx_queue: Mutex::new(Some(rx_queue)),
            connected: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            supervisor: Mutex::new(None),
        })
    }

    /// Start the connection supervisor. Subsequent calls are no-ops.
    pub fn connect(self: &Arc<Self>) {
        let mut guard = self.supervisor.lock();
        if guard.is_some() || self.cancel.is_cancelled() {
            return;
        }
        let channel = Arc::clone(self);
        *guard = Some(tokio::spawn(async move { channel.run().await }));
    }

    /// Enqueue an outgoing message. Never blocks.
    pub fn send(&self, message: EventMessage) -> Result<(), EventsError> {
        if self.cancel.is_cancelled() {
            return Err(EventsError::NotConnected);
        }
        self.tx_queue.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EventsError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => EventsError::NotConnected,
        })
    }

    /// Take the receive side. Yields `Some` exactly once.
    pub fn subscribe(&self) -> Option<mpsc::Receiver<EventMessage>> {
        self.rx_queue.lock().take()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Tear the channel down. Idempotent.
    pub async fn close(&self) {
        self.cancel.cancel();
        let task = self.supervisor.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn run(&self) {
        let mut backoff = Backoff::new(RECONNECT_BASE, RECONNECT_MAX);
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.dial().await {
                Ok(ws) => {
                    backoff.reset();
                    self.connected.store(true, Ordering::SeqCst);
                    tracing::info!("events channel connected");
                    self.serve(ws).await;
                    self.connected.store(false, Ordering::SeqCst);
                    tracing::info!("events channel disconnected");
                }
                Err(e) => tracing::warn!(error = %e, "events connect failed"),
            }
            if self.cancel.is_cancelled() {
                break;
            }
            let delay = backoff.next_delay();
            tracing::debug!(attempt = backoff.attempt(), ?delay, "events reconnect scheduled");
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn dial(&self) -> Result<WsStream, EventsError> {
        let mut request = self
            .ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| EventsError::Handshake(e.to_string()))?;
        if let Some(token) = &self.access_token {
            if let Ok(value) = format!("Bearer {token}").parse() {
                request.headers_mut().insert(
                    tokio_tungstenite::tungstenite::http::header::AUTHORIZATION,
                    value,
                );
            }
        }

        let (ws, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| EventsError::Handshake("connect timed out".to_string()))?
            .map_err(|e| EventsError::Handshake(e.to_string()))?;
        Ok(ws)
    }

    /// Serve one connection until either half dies, then shut both
    /// halves down exactly once.
    async fn serve(&self, ws: WsStream) {
        let (write, read) = ws.split();
        let conn_cancel = self.cancel.child_token();

        let mut writer =
            tokio::spawn(write_loop(write, Arc::clone(&self.tx_shared), conn_cancel.clone()));
        let mut reader = tokio::spawn(read_loop(read, self.rx_tx.clone(), conn_cancel.clone()));

        tokio::select! {
            _ = &mut writer => {
                conn_cancel.cancel();
                let _ = reader.await;
            }
            _ = &mut reader => {
                conn_cancel.cancel();
                let _ = writer.await;
            }
        }
    }
}

async fn write_loop(
    mut write: SplitSink<WsStream, Message>,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<EventMessage>>>,
    cancel: CancellationToken,
) {
    let first_ping = tokio::time::Instant::now() + PING_INTERVAL;
    let mut ping = tokio::time::interval_at(first_ping, PING_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = tokio::time::timeout(WRITE_TIMEOUT, write.send(Message::Close(None))).await;
                break;
            }
            message = async { queue.lock().await.recv().await } => {
                let Some(message) = message else { break };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(id = %message.id, error = %e, "unencodable event, dropping");
                        continue;
                    }
                };
                match tokio::time::timeout(WRITE_TIMEOUT, write.send(Message::text(text))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "events write failed");
                        break;
                    }
                    Err(_) => {
                        tracing::warn!("events write deadline exceeded");
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                match tokio::time::timeout(WRITE_TIMEOUT, write.send(Message::Ping(Vec::new().into()))).await {
                    Ok(Ok(())) => {}
                    _ => {
                        tracing::warn!("events ping failed");
                        break;
                    }
                }
            }
        }
    }
}

async fn read_loop(
    mut read: SplitStream<WsStream>,
    rx_tx: mpsc::Sender<EventMessage>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<EventMessage>(text.as_str()) {
                    Ok(message) => match rx_tx.try_send(message) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(dropped)) => {
                            tracing::warn!(id = %dropped.id, "receive queue full, dropping event");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    },
                    Err(e) => tracing::warn!(error = %e, "malformed event frame"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // ping/pong/binary keepalive traffic
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "events read failed");
                    break;
                }
            }
        }
    }
}

/// Map the server base URL onto the websocket endpoint.
fn ws_url(base: &Url) -> Result<String, EventsError> {
    let joined = base
        .join(EVENTS_PATH)
        .map_err(|e| EventsError::Handshake(e.to_string()))?;
    let raw = joined.as_str();
    if let Some(rest) = raw.strip_prefix("https://") {
        Ok(format!("wss://{rest}"))
    } else if let Some(rest) = raw.strip_prefix("http://") {
        Ok(format!("ws://{rest}"))
    } else if raw.starts_with("ws://") || raw.starts_with("wss://") {
        Ok(raw.to_string())
    } else {
        Err(EventsError::Handshake(format!("unsupported scheme in {raw}")))
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
