//! socket.io channel over WebSocket (Engine.IO protocol v3, as spoken by
//! Volumio's websocket API)
//!
//! Frames are text messages prefixed by an Engine.IO packet type, with
//! socket.io packets nested inside type `4`:
//!
//! | Frame                | Meaning                      |
//! |----------------------|------------------------------|
//! | `0{json}`            | open handshake (ping timing) |
//! | `1`                  | close                        |
//! | `2` / `3`            | ping / pong                  |
//! | `40` / `41`          | namespace connect/disconnect |
//! | `42["event",data]`   | event                        |
//!
//! Each channel owns one background task that connects, dispatches inbound
//! events to the registered handlers, drains the outgoing queue and
//! reconnects with backoff when the transport drops.

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use crate::channel::{
    endpoint_url, Channel, Connector, EventHandler, LifecycleEvent, LifecycleHandler,
    ReconnectPolicy,
};
use crate::error::ChannelError;

/// Outgoing frames buffered per channel while disconnected
const DEFAULT_OUTGOING_CAPACITY: usize = 64;

const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;
const DEFAULT_PING_TIMEOUT_MS: u64 = 60_000;

const FRAME_CLOSE: &str = "1";
const FRAME_PING: &str = "2";
const FRAME_PONG: &str = "3";

/// Engine.IO open handshake
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    #[serde(default)]
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    DEFAULT_PING_INTERVAL_MS
}

fn default_ping_timeout() -> u64 {
    DEFAULT_PING_TIMEOUT_MS
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Connect,
    Disconnect,
    Event { name: String, payload: Value },
    /// Anything else (acks, binary placeholders, noop)
    Other,
}

/// Encode an event as a socket.io text frame
pub fn encode_event(event: &str, payload: Option<&Value>) -> String {
    let args = match payload {
        Some(payload) => Value::Array(vec![Value::String(event.to_string()), payload.clone()]),
        None => Value::Array(vec![Value::String(event.to_string())]),
    };
    format!("42{}", args)
}

/// Decode one inbound text frame. Returns `None` for frames that cannot be
/// parsed at all.
pub fn decode_frame(text: &str) -> Option<Packet> {
    let mut chars = text.chars();
    let kind = chars.next()?;
    let rest = chars.as_str();

    match kind {
        '0' => serde_json::from_str(rest).ok().map(Packet::Open),
        '1' => Some(Packet::Close),
        '2' => Some(Packet::Ping(rest.to_string())),
        '3' => Some(Packet::Pong(rest.to_string())),
        '4' => decode_socket_packet(rest),
        '5' | '6' => Some(Packet::Other),
        _ => None,
    }
}

fn decode_socket_packet(text: &str) -> Option<Packet> {
    let mut chars = text.chars();
    let kind = chars.next()?;
    let rest = chars.as_str();

    match kind {
        '0' => Some(Packet::Connect),
        '1' => Some(Packet::Disconnect),
        '2' => {
            // Optional namespace ("/ns,") and ack id precede the arguments
            let rest = match rest.strip_prefix('/') {
                Some(ns) => ns.split_once(',').map(|(_, args)| args)?,
                None => rest,
            };
            let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

            let args: Vec<Value> = serde_json::from_str(rest).ok()?;
            let mut args = args.into_iter();
            let name = match args.next()? {
                Value::String(name) => name,
                _ => return None,
            };
            Some(Packet::Event {
                name,
                payload: args.next().unwrap_or(Value::Null),
            })
        }
        _ => Some(Packet::Other),
    }
}

#[derive(Default)]
struct Handlers {
    events: HashMap<String, EventHandler>,
    lifecycle: Option<LifecycleHandler>,
}

type SharedHandlers = Arc<RwLock<Handlers>>;

// Handlers run under the read lock; `close` takes the write lock, so once it
// has cleared the maps no handler can still be running.
fn dispatch_event(handlers: &SharedHandlers, name: &str, payload: Value) {
    let handlers = handlers.read();
    match handlers.events.get(name) {
        Some(handler) => handler(payload),
        None => trace!("No handler for event {}", name),
    }
}

fn dispatch_lifecycle(handlers: &SharedHandlers, event: LifecycleEvent) {
    let handlers = handlers.read();
    if let Some(handler) = handlers.lifecycle.as_ref() {
        handler(&event);
    }
}

/// Opens [`SocketIoChannel`]s
#[derive(Debug, Clone)]
pub struct SocketIoConnector {
    policy: ReconnectPolicy,
    outgoing_capacity: usize,
}

impl SocketIoConnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            outgoing_capacity: DEFAULT_OUTGOING_CAPACITY,
        }
    }

    pub fn with_outgoing_capacity(mut self, capacity: usize) -> Self {
        self.outgoing_capacity = capacity.max(1);
        self
    }
}

impl Default for SocketIoConnector {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

impl Connector for SocketIoConnector {
    fn open(&self, host: &str, port: u16) -> Result<Box<dyn Channel>, ChannelError> {
        let url = endpoint_url(host, port)?;
        let (tx, rx) = mpsc::channel(self.outgoing_capacity);

        Ok(Box::new(SocketIoChannel {
            endpoint: format!("{}:{}", host, port),
            url,
            policy: self.policy.clone(),
            handlers: Arc::new(RwLock::new(Handlers::default())),
            outgoing_tx: tx,
            outgoing_rx: Some(rx),
            shutdown: CancellationToken::new(),
            closed: false,
        }))
    }
}

/// One socket.io connection with its own reconnecting task
pub struct SocketIoChannel {
    endpoint: String,
    url: Url,
    policy: ReconnectPolicy,
    handlers: SharedHandlers,
    outgoing_tx: mpsc::Sender<String>,
    /// Taken by the task on `connect`
    outgoing_rx: Option<mpsc::Receiver<String>>,
    shutdown: CancellationToken,
    closed: bool,
}

impl Channel for SocketIoChannel {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn on(&mut self, event: &str, handler: EventHandler) {
        self.handlers
            .write()
            .events
            .insert(event.to_string(), handler);
    }

    fn on_lifecycle(&mut self, handler: LifecycleHandler) {
        self.handlers.write().lifecycle = Some(handler);
    }

    fn off(&mut self, event: &str) {
        self.handlers.write().events.remove(event);
    }

    fn connect(&mut self) {
        if self.closed {
            return;
        }
        let Some(outgoing) = self.outgoing_rx.take() else {
            return;
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!("Cannot start channel to {}: {}", self.endpoint, e);
                return;
            }
        };

        let task = ConnectionTask {
            endpoint: self.endpoint.clone(),
            url: self.url.clone(),
            policy: self.policy.clone(),
            handlers: self.handlers.clone(),
            shutdown: self.shutdown.clone(),
        };
        runtime.spawn(task.run(outgoing));
    }

    fn emit(&self, event: &str, payload: Option<Value>) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed(self.endpoint.clone()));
        }
        let frame = encode_event(event, payload.as_ref());
        self.outgoing_tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::QueueFull(self.endpoint.clone()),
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed(self.endpoint.clone()),
        })
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        {
            let mut handlers = self.handlers.write();
            handlers.events.clear();
            handlers.lifecycle = None;
        }
        self.shutdown.cancel();
        self.closed = true;
        debug!("Closed channel to {}", self.endpoint);
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for SocketIoChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// How a single websocket session ended
enum SessionEnd {
    Shutdown,
    Lost(String),
}

struct ConnectionTask {
    endpoint: String,
    url: Url,
    policy: ReconnectPolicy,
    handlers: SharedHandlers,
    shutdown: CancellationToken,
}

impl ConnectionTask {
    async fn run(self, mut outgoing: mpsc::Receiver<String>) {
        // 0 while no reconnect cycle is in progress
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 {
                if !self.policy.allows(attempt) {
                    dispatch_lifecycle(&self.handlers, LifecycleEvent::ReconnectFailed);
                    break;
                }
                dispatch_lifecycle(&self.handlers, LifecycleEvent::ReconnectAttempt { attempt });

                let delay = self.policy.delay_for(attempt);
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let connected = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = tokio_tungstenite::connect_async(self.url.as_str()) => result,
            };

            match connected {
                Ok((ws, _)) => {
                    debug!("WebSocket open to {}", self.endpoint);
                    match self.run_session(ws, &mut outgoing).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Lost(reason) => {
                            dispatch_lifecycle(
                                &self.handlers,
                                LifecycleEvent::Disconnected { reason },
                            );
                            attempt = 1;
                        }
                    }
                }
                Err(e) => {
                    let error = e.to_string();
                    if attempt == 0 {
                        dispatch_lifecycle(&self.handlers, LifecycleEvent::ConnectError { error });
                    } else {
                        dispatch_lifecycle(
                            &self.handlers,
                            LifecycleEvent::ReconnectError { error },
                        );
                    }
                    attempt = attempt.saturating_add(1);
                }
            }
        }

        debug!("Channel task for {} stopped", self.endpoint);
    }

    async fn run_session<S>(
        &self,
        ws: tokio_tungstenite::WebSocketStream<S>,
        outgoing: &mut mpsc::Receiver<String>,
    ) -> SessionEnd
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (mut sink, mut stream) = ws.split();

        // Outgoing frames and pings wait for the open handshake
        let mut opened = false;
        let mut ping_every = Duration::from_millis(DEFAULT_PING_INTERVAL_MS);
        let mut pong_deadline = ping_every + Duration::from_millis(DEFAULT_PING_TIMEOUT_MS);
        let mut ping_timer = interval_at(Instant::now() + ping_every, ping_every);
        let mut last_pong = Instant::now();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = sink.send(Message::Text(FRAME_CLOSE.into())).await;
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                }

                message = stream.next() => {
                    let text = match message {
                        None => return SessionEnd::Lost("transport close".to_string()),
                        Some(Err(e)) => return SessionEnd::Lost(format!("transport error: {}", e)),
                        Some(Ok(Message::Close(_))) => {
                            return SessionEnd::Lost("transport close".to_string())
                        }
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(_)) => continue,
                    };

                    match decode_frame(text.as_str()) {
                        Some(Packet::Open(handshake)) => {
                            ping_every = Duration::from_millis(handshake.ping_interval.max(1));
                            pong_deadline = ping_every + Duration::from_millis(handshake.ping_timeout);
                            ping_timer = interval_at(Instant::now() + ping_every, ping_every);
                            last_pong = Instant::now();
                            opened = true;
                            debug!("Engine.IO session {} with {}", handshake.sid, self.endpoint);
                            dispatch_lifecycle(&self.handlers, LifecycleEvent::Connected);
                        }
                        Some(Packet::Ping(probe)) => {
                            let pong = format!("{}{}", FRAME_PONG, probe);
                            if let Err(e) = sink.send(Message::Text(pong.into())).await {
                                return SessionEnd::Lost(format!("transport error: {}", e));
                            }
                        }
                        Some(Packet::Pong(_)) => last_pong = Instant::now(),
                        Some(Packet::Event { name, payload }) => {
                            dispatch_event(&self.handlers, &name, payload);
                        }
                        Some(Packet::Close) | Some(Packet::Disconnect) => {
                            return SessionEnd::Lost("io server disconnect".to_string());
                        }
                        Some(Packet::Connect) | Some(Packet::Other) => {}
                        None => warn!("Unparseable frame from {}: {}", self.endpoint, text.as_str()),
                    }
                }

                frame = outgoing.recv(), if opened => {
                    let Some(frame) = frame else {
                        // Every sender is gone, the channel was dropped
                        return SessionEnd::Shutdown;
                    };
                    trace!("-> {} {}", self.endpoint, frame);
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        return SessionEnd::Lost(format!("transport error: {}", e));
                    }
                }

                _ = ping_timer.tick(), if opened => {
                    if last_pong.elapsed() > pong_deadline {
                        return SessionEnd::Lost("ping timeout".to_string());
                    }
                    if let Err(e) = sink.send(Message::Text(FRAME_PING.into())).await {
                        return SessionEnd::Lost(format!("transport error: {}", e));
                    }
                }
            }
        }
    }
}
