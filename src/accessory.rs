//! Accessory model and the seam to whatever hosts the accessories.
//!
//! The bridge never talks to a home-automation framework directly. It calls
//! an [`AccessoryHost`], and the shipped host ([`BusHost`]) turns every call
//! into a bus event that surfaces (MQTT, tests) subscribe to.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use uuid::Uuid;

use crate::bus::{BusEvent, SharedBus};
use crate::translate::TransportStatus;

pub const MANUFACTURER: &str = "Volumio";
pub const SPEAKER_MODEL: &str = "Zone";
pub const SENSOR_MODEL: &str = "Zone Playback Sensor";

/// Speaker category; speakers are only accepted as external accessories
/// with this category set
pub const SPEAKER_CATEGORY: u8 = 26;
pub const SENSOR_CATEGORY: u8 = 10;

/// Namespace for accessory UUIDs. Changing it changes every accessory id.
const ACCESSORY_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_4c3e_9a8d_5e2f_b7c1_0d4a_3e9f_8a21);

const SENSOR_SUFFIX: &str = ":sensor";

/// Stable accessory id for a zone's speaker
pub fn accessory_id(zone_id: &str) -> Uuid {
    Uuid::new_v5(&ACCESSORY_NAMESPACE, zone_id.as_bytes())
}

/// Stable accessory id for a zone's playback sensor
pub fn sensor_accessory_id(zone_id: &str) -> Uuid {
    accessory_id(&format!("{}{}", zone_id, SENSOR_SUFFIX))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessoryKind {
    Speaker,
    Sensor,
}

impl AccessoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Speaker => "speaker",
            Self::Sensor => "sensor",
        }
    }
}

impl fmt::Display for AccessoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a host needs to publish an accessory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryInfo {
    pub id: Uuid,
    pub zone_id: String,
    pub kind: AccessoryKind,
    pub display_name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub category: u8,
}

impl AccessoryInfo {
    pub fn speaker(zone_id: &str, display_name: &str) -> Self {
        let id = accessory_id(zone_id);
        Self {
            id,
            zone_id: zone_id.to_string(),
            kind: AccessoryKind::Speaker,
            display_name: display_name.to_string(),
            manufacturer: MANUFACTURER.to_string(),
            model: SPEAKER_MODEL.to_string(),
            serial_number: id.to_string(),
            category: SPEAKER_CATEGORY,
        }
    }

    pub fn sensor(zone_id: &str, display_name: &str) -> Self {
        let id = sensor_accessory_id(zone_id);
        Self {
            id,
            zone_id: zone_id.to_string(),
            kind: AccessoryKind::Sensor,
            display_name: display_name.to_string(),
            manufacturer: MANUFACTURER.to_string(),
            model: SENSOR_MODEL.to_string(),
            serial_number: id.to_string(),
            category: SENSOR_CATEGORY,
        }
    }
}

/// An observable characteristic value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "characteristic", content = "value", rename_all = "snake_case")]
pub enum Characteristic {
    CurrentMediaState(TransportStatus),
    TargetMediaState(TransportStatus),
    Volume(u8),
    Mute(bool),
    ConfiguredName(String),
    ContactSensorState(bool),
}

impl Characteristic {
    /// Topic-style name (`current_media_state`, `volume`, ...)
    pub fn name(&self) -> &'static str {
        match self {
            Self::CurrentMediaState(_) => "current_media_state",
            Self::TargetMediaState(_) => "target_media_state",
            Self::Volume(_) => "volume",
            Self::Mute(_) => "mute",
            Self::ConfiguredName(_) => "configured_name",
            Self::ContactSensorState(_) => "contact_sensor_state",
        }
    }

    /// Value in characteristic encoding: media states as 0/1/2, contact
    /// sensor as 0/1
    pub fn value(&self) -> Value {
        match self {
            Self::CurrentMediaState(status) | Self::TargetMediaState(status) => {
                json!(status.characteristic_value())
            }
            Self::Volume(volume) => json!(volume),
            Self::Mute(muted) => json!(muted),
            Self::ConfiguredName(name) => json!(name),
            Self::ContactSensorState(detected) => json!(u8::from(*detected)),
        }
    }
}

/// A request coming from the accessory side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum SpeakerCommand {
    /// Raw TargetMediaState value (0 play, 1 pause, 2 stop)
    SetTargetMediaState(u8),
    SetVolume(f64),
    SetMute(bool),
}

/// Receives accessory publications and characteristic pushes.
///
/// Implementations must not block: they are called from the bridge loop.
pub trait AccessoryHost: Send {
    fn publish(&mut self, accessory: &AccessoryInfo);

    fn update(&mut self, zone_id: &str, kind: AccessoryKind, characteristic: &Characteristic);

    fn rename(&mut self, zone_id: &str, kind: AccessoryKind, display_name: &str);
}

/// Host that forwards everything onto the event bus
pub struct BusHost {
    bus: SharedBus,
}

impl BusHost {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }
}

impl AccessoryHost for BusHost {
    fn publish(&mut self, accessory: &AccessoryInfo) {
        self.bus.publish(BusEvent::AccessoryPublished {
            accessory: accessory.clone(),
        });
    }

    fn update(&mut self, zone_id: &str, kind: AccessoryKind, characteristic: &Characteristic) {
        self.bus.publish(BusEvent::CharacteristicUpdated {
            zone_id: zone_id.to_string(),
            kind,
            characteristic: characteristic.clone(),
        });
    }

    fn rename(&mut self, zone_id: &str, kind: AccessoryKind, display_name: &str) {
        self.bus.publish(BusEvent::AccessoryRenamed {
            zone_id: zone_id.to_string(),
            kind,
            display_name: display_name.to_string(),
        });
    }
}
