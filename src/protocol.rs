//! Volumio websocket API payloads and event names.
//!
//! See https://volumio.github.io/docs/API/WebSocket_APIs.html

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default socket.io port for both the roster and per-zone channels
pub const DEFAULT_PORT: u16 = 3000;

/// Full player state, pushed by a zone in reply to `getState` and on change
pub const EVENT_PUSH_STATE: &str = "pushState";
pub const EVENT_GET_STATE: &str = "getState";
/// Multiroom roster, pushed by the server in reply to `getMultiRoomDevices`
pub const EVENT_PUSH_ROSTER: &str = "pushMultiRoomDevices";
pub const EVENT_GET_ROSTER: &str = "getMultiRoomDevices";

pub const CMD_PLAY: &str = "play";
pub const CMD_PAUSE: &str = "pause";
pub const CMD_STOP: &str = "stop";
pub const CMD_VOLUME: &str = "volume";
pub const CMD_MUTE: &str = "mute";
pub const CMD_UNMUTE: &str = "unmute";

/// The `stream` field: a bool for some services, the stream type for others
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamFlag {
    Flag(bool),
    Kind(String),
}

/// Player state as reported by a zone.
///
/// Every field is optional. Only `status`, `volume`, `mute` and `stream`
/// matter to the reconciler; the rest is kept for debug logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub mute: Option<bool>,
    #[serde(default)]
    pub stream: Option<StreamFlag>,

    // Kept untyped: a plugin sending a number here must not cost the
    // status, volume and mute of the same push.
    #[serde(default)]
    pub title: Option<Value>,
    #[serde(default)]
    pub artist: Option<Value>,
    #[serde(default)]
    pub album: Option<Value>,
    #[serde(default)]
    pub service: Option<Value>,
    #[serde(default)]
    pub track_type: Option<Value>,
    #[serde(default)]
    pub uri: Option<Value>,
}

impl PlayerState {
    /// `title / artist (service)` for logging, if a title is present
    pub fn now_playing(&self) -> Option<String> {
        let title = info_text(self.title.as_ref())?;
        Some(format!(
            "{} / {} ({})",
            title,
            info_text(self.artist.as_ref()).unwrap_or_else(|| "-".to_string()),
            info_text(self.service.as_ref()).unwrap_or_else(|| "-".to_string())
        ))
    }
}

fn info_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// One entry of the multiroom roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDescriptor {
    pub id: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub state: Option<PlayerState>,
}

impl ZoneDescriptor {
    /// Host if present and non-empty
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().filter(|h| !h.trim().is_empty())
    }
}

/// A roster push. Entries stay raw so each one is decoded on its own.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterSnapshot {
    #[serde(default)]
    pub misc: Option<Value>,
    pub list: Vec<Value>,
}

impl RosterSnapshot {
    /// Decode a raw `pushMultiRoomDevices` payload
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}
