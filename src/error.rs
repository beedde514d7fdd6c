//! Library error types
//!
//! Nothing here ever reaches the accessory layer. Callers log these and keep
//! the last known state.

use thiserror::Error;

/// Failures of a single event channel
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid endpoint for host {host:?}: {reason}")]
    InvalidEndpoint { host: String, reason: String },

    #[error("channel to {0} is closed")]
    Closed(String),

    #[error("outgoing queue for {0} is full")]
    QueueFull(String),
}

/// Failures while registering or updating a zone
#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("zone descriptor has no host: {0}")]
    MissingHost(String),

    #[error("zone descriptor is malformed: {0}")]
    Malformed(String),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}
