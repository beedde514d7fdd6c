//! Status translation between the Volumio player vocabulary and accessory
//! characteristic values.
//!
//! Every function here is pure and total: unknown input falls back to a safe
//! default instead of failing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::protocol::{StreamFlag, CMD_PAUSE, CMD_PLAY, CMD_STOP};

/// Transport state of a zone.
///
/// The discriminants are the characteristic encoding used by
/// CurrentMediaState / TargetMediaState.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportStatus {
    Play = 0,
    #[default]
    Pause = 1,
    Stop = 2,
}

impl TransportStatus {
    /// Characteristic value for this status
    pub fn characteristic_value(self) -> u8 {
        self as u8
    }

    /// Parse a characteristic value; anything unknown means `Stop`
    pub fn from_characteristic(value: u8) -> Self {
        match value {
            0 => Self::Play,
            1 => Self::Pause,
            _ => Self::Stop,
        }
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(to_raw_command(*self))
    }
}

/// Map a raw Volumio status (`play`, `pause`, `stop`) to a transport status.
///
/// Missing or unrecognised input is `Stop`.
pub fn to_transport_status(raw: Option<&str>) -> TransportStatus {
    match raw {
        Some(CMD_PLAY) => TransportStatus::Play,
        Some(CMD_PAUSE) => TransportStatus::Pause,
        _ => TransportStatus::Stop,
    }
}

/// Map a transport status to the command string Volumio expects
pub fn to_raw_command(status: TransportStatus) -> &'static str {
    match status {
        TransportStatus::Play => CMD_PLAY,
        TransportStatus::Pause => CMD_PAUSE,
        TransportStatus::Stop => CMD_STOP,
    }
}

/// Round, then bound into `0..=100`.
///
/// Out-of-range values saturate at the nearest bound. NaN is treated as 0.
pub fn clamp_volume(volume: f64) -> u8 {
    if volume.is_nan() {
        return 0;
    }
    volume.round().clamp(0.0, 100.0) as u8
}

/// Volumio reports `stream` as a bool for some services and as a string
/// (the stream type) for others. Any non-empty string counts as a stream.
pub fn normalize_stream_flag(flag: Option<&StreamFlag>) -> bool {
    match flag {
        Some(StreamFlag::Flag(value)) => *value,
        Some(StreamFlag::Kind(kind)) => !kind.is_empty(),
        None => false,
    }
}

/// Turn a Volumio device name like `living-room` into `Living Room`.
///
/// Empty segments (from `--` or leading/trailing dashes) are dropped.
pub fn prettify(raw_name: &str) -> String {
    raw_name
        .split('-')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let lower = segment.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
