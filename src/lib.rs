//! Volumio Speakers Bridge
//!
//! Discovers the zones of a Volumio multiroom setup and exposes each one as
//! a smart speaker accessory (transport state, volume, mute), optionally with
//! a companion "is playing" sensor.
//!
//! This library provides:
//! - A socket.io channel to every zone, with reconnect and backoff
//! - Per-zone state reconciliation that only pushes changed characteristics
//! - A zone registry keyed on the stable zone id
//! - MQTT integration for home automation

pub mod accessory;
pub mod adapters;
pub mod bridge;
pub mod bus;
pub mod channel;
pub mod config;
pub mod error;
pub mod protocol;
pub mod reconciler;
pub mod registry;
pub mod sensor;
pub mod translate;
