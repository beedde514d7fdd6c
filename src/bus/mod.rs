//! Event bus for inter-component communication
//!
//! Uses tokio::sync::broadcast for pub/sub pattern.
//! The bridge publishes accessory changes here; surfaces (MQTT) publish
//! commands here and listen for acknowledgements.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::accessory::{AccessoryInfo, AccessoryKind, Characteristic, SpeakerCommand};

/// Event types that can be published on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BusEvent {
    // Accessory side (bridge -> surfaces)
    AccessoryPublished {
        accessory: AccessoryInfo,
    },
    AccessoryRenamed {
        zone_id: String,
        kind: AccessoryKind,
        display_name: String,
    },
    CharacteristicUpdated {
        zone_id: String,
        kind: AccessoryKind,
        characteristic: Characteristic,
    },
    ZoneHostChanged {
        zone_id: String,
        host: String,
    },

    // Control (surfaces -> bridge -> surfaces)
    CommandReceived {
        zone_id: String,
        command: SpeakerCommand,
    },
    CommandAcknowledged {
        zone_id: String,
        characteristic: Characteristic,
    },

    ShuttingDown {
        reason: Option<String>,
    },
}

impl BusEvent {
    /// Event type name, for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AccessoryPublished { .. } => "AccessoryPublished",
            Self::AccessoryRenamed { .. } => "AccessoryRenamed",
            Self::CharacteristicUpdated { .. } => "CharacteristicUpdated",
            Self::ZoneHostChanged { .. } => "ZoneHostChanged",
            Self::CommandReceived { .. } => "CommandReceived",
            Self::CommandAcknowledged { .. } => "CommandAcknowledged",
            Self::ShuttingDown { .. } => "ShuttingDown",
        }
    }
}

/// Event bus handle for publishing and subscribing
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: BusEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    /// Default capacity (256 events)
    fn default() -> Self {
        Self::new(256)
    }
}

/// Shared event bus wrapped in Arc for thread-safe sharing
pub type SharedBus = Arc<EventBus>;

/// Create a new shared event bus
pub fn create_bus() -> SharedBus {
    Arc::new(EventBus::default())
}
