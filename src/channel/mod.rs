//! Event channels
//!
//! A channel is one bidirectional event connection to a Volumio endpoint
//! (the roster server or a single zone). The core only sees this contract;
//! the socket.io transport lives in `adapters::socketio`, an in-process
//! implementation in [`memory`].
//!
//! Usage is always open, register, connect:
//!
//! ```ignore
//! let mut channel = connector.open(host, port)?;
//! channel.on("pushState", Box::new(move |payload| { /* enqueue */ }));
//! channel.on_lifecycle(Box::new(move |event| { /* enqueue */ }));
//! channel.connect();
//! ```

pub mod memory;

use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::ChannelError;

/// Handler for a named inbound event
pub type EventHandler = Box<dyn Fn(Value) + Send + Sync>;

/// Handler for transport lifecycle changes
pub type LifecycleHandler = Box<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Transport lifecycle, reported for logging and re-sync only
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connected,
    Disconnected { reason: String },
    ReconnectAttempt { attempt: u32 },
    ConnectError { error: String },
    ReconnectError { error: String },
    ReconnectFailed,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected { reason } => write!(f, "disconnected ({})", reason),
            Self::ReconnectAttempt { attempt } => write!(f, "reconnect attempt {}", attempt),
            Self::ConnectError { error } => write!(f, "connect error ({})", error),
            Self::ReconnectError { error } => write!(f, "reconnect error ({})", error),
            Self::ReconnectFailed => write!(f, "reconnect failed"),
        }
    }
}

/// A duplex event connection.
///
/// Handlers are invoked from the transport's task, so they must only hand
/// the payload off (e.g. `try_send` into an inbox) and never block.
pub trait Channel: Send {
    /// Endpoint this channel talks to (for logs)
    fn endpoint(&self) -> &str;

    /// Register the handler for `event`, replacing any previous one
    fn on(&mut self, event: &str, handler: EventHandler);

    /// Register the lifecycle handler, replacing any previous one
    fn on_lifecycle(&mut self, handler: LifecycleHandler);

    /// Unregister the handler for `event`
    fn off(&mut self, event: &str);

    /// Start the transport. Calling it twice is a no-op.
    fn connect(&mut self);

    /// Queue an outgoing event. Never waits for the network; frames emitted
    /// while disconnected are flushed after the next connect.
    fn emit(&self, event: &str, payload: Option<Value>) -> Result<(), ChannelError>;

    /// Unregister every handler, then tear the transport down.
    /// No handler runs after this returns.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Opens channels. One connector is shared by the roster and all zones.
pub trait Connector: Send + Sync {
    /// Build an unstarted channel for `host` on `port`
    fn open(&self, host: &str, port: u16) -> Result<Box<dyn Channel>, ChannelError>;
}

/// Reconnect cadence for a channel's transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt
    pub initial_delay: Duration,
    /// Backoff caps at this value
    pub max_delay: Duration,
    /// Give up after this many failed attempts (`None` retries forever)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based), doubling from
    /// `initial_delay` and capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 1..attempt {
            delay = (delay * 2).min(self.max_delay);
            if delay == self.max_delay {
                break;
            }
        }
        delay.min(self.max_delay)
    }

    /// Whether attempt number `attempt` (1-based) may still run
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

/// Write a lifecycle event to the log.
///
/// `label` identifies the owner (zone display name or "roster").
pub fn log_lifecycle(label: &str, endpoint: &str, event: &LifecycleEvent) {
    match event {
        LifecycleEvent::Connected => {
            tracing::info!(zone = %label, "Socket connected: {}", endpoint)
        }
        LifecycleEvent::ReconnectAttempt { attempt } => {
            tracing::info!(zone = %label, "Socket reconnecting... Attempt: {}", attempt)
        }
        LifecycleEvent::Disconnected { reason } => {
            tracing::warn!(zone = %label, "Socket disconnected: {}", reason)
        }
        LifecycleEvent::ConnectError { error } => {
            tracing::error!(zone = %label, "Socket connection error: {} {}", endpoint, error)
        }
        LifecycleEvent::ReconnectError { error } => {
            tracing::error!(zone = %label, "Socket reconnection error: {}", error)
        }
        LifecycleEvent::ReconnectFailed => {
            tracing::error!(zone = %label, "Socket reconnection failed: {}", endpoint)
        }
    }
}

/// Build the socket.io websocket URL for a Volumio host.
///
/// Accepts `192.168.1.20`, `volumio.local`, `http://volumio.local` or
/// `https://host:1234`. The given port always wins over one in `host`.
pub fn endpoint_url(host: &str, port: u16) -> Result<Url, ChannelError> {
    let invalid = |reason: String| ChannelError::InvalidEndpoint {
        host: host.to_string(),
        reason,
    };

    let trimmed = host.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty host".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let parsed = Url::parse(&with_scheme).map_err(|e| invalid(e.to_string()))?;
    let ws_scheme = match parsed.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme {}", other))),
    };
    let host_str = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("no host".to_string()))?;

    let url = format!(
        "{}://{}:{}/socket.io/?EIO=3&transport=websocket",
        ws_scheme, host_str, port
    );
    Url::parse(&url).map_err(|e| invalid(e.to_string()))
}
