//! MQTT Adapter
//!
//! Bridges the internal event bus to MQTT for home-automation integration.
//!
//! Published (retained):
//! - `<prefix>/zones/<zone_id>/<speaker|sensor>/config`: accessory JSON
//! - `<prefix>/zones/<zone_id>/<speaker|sensor>/<characteristic>`: value
//!
//! Subscribed:
//! - `<prefix>/zones/<zone_id>/set/<target_media_state|volume|mute>`

use anyhow::{anyhow, Result};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::accessory::{AccessoryKind, SpeakerCommand};
use crate::bus::{BusEvent, SharedBus};
use crate::config::MqttConfig;
use crate::translate::TransportStatus;

const CLIENT_ID: &str = "volumio-speakers-bridge";

/// MQTT connection status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttStatus {
    pub connected: bool,
    pub host: Option<String>,
    pub port: u16,
    pub topic_prefix: String,
}

/// One message to publish
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// Split `<prefix>/zones/<zone_id>/set/<characteristic>`
pub fn parse_control_topic<'a>(prefix: &str, topic: &'a str) -> Option<(&'a str, &'a str)> {
    let rest = topic.strip_prefix(prefix)?.strip_prefix("/zones/")?;
    let (zone_id, rest) = rest.split_once('/')?;
    let characteristic = rest.strip_prefix("set/")?;
    if zone_id.is_empty() || characteristic.is_empty() || characteristic.contains('/') {
        return None;
    }
    Some((zone_id, characteristic))
}

/// Parse a set-topic payload into a command.
///
/// `target_media_state` takes 0/1/2 or play/pause/stop, `volume` a number,
/// `mute` true/false, 1/0 or on/off. JSON and plain text are both accepted.
pub fn parse_command(characteristic: &str, payload: &str) -> Option<SpeakerCommand> {
    let text = payload.trim();
    let value: Value = serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));

    match characteristic {
        "target_media_state" => {
            let raw = match &value {
                Value::Number(n) => u8::try_from(n.as_u64()?).ok()?,
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "play" => TransportStatus::Play.characteristic_value(),
                    "pause" => TransportStatus::Pause.characteristic_value(),
                    "stop" => TransportStatus::Stop.characteristic_value(),
                    _ => return None,
                },
                _ => return None,
            };
            Some(SpeakerCommand::SetTargetMediaState(raw))
        }
        "volume" => {
            let volume = match &value {
                Value::Number(n) => n.as_f64()?,
                Value::String(s) => s.parse::<f64>().ok()?,
                _ => return None,
            };
            Some(SpeakerCommand::SetVolume(volume))
        }
        "mute" => {
            let muted = match &value {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_u64()? != 0,
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" | "on" | "1" => true,
                    "false" | "off" | "0" => false,
                    _ => return None,
                },
                _ => return None,
            };
            Some(SpeakerCommand::SetMute(muted))
        }
        _ => None,
    }
}

fn state_topic(prefix: &str, zone_id: &str, kind: AccessoryKind, name: &str) -> String {
    format!("{}/zones/{}/{}/{}", prefix, zone_id, kind, name)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Queue the control subscription without waiting for room.
///
/// Runs on the task that polls the event loop, which is the only thing that
/// drains the request queue, so it must never block on a full queue.
fn request_control_subscription(client: &AsyncClient, topic: &str) -> bool {
    match client.try_subscribe(topic, QoS::AtMostOnce) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("MQTT subscribe to {} failed: {}", topic, e);
            false
        }
    }
}

/// Map a bus event to the MQTT message it produces, if any
pub fn outgoing_message(prefix: &str, event: &BusEvent) -> Option<OutgoingMessage> {
    match event {
        BusEvent::AccessoryPublished { accessory } => Some(OutgoingMessage {
            topic: state_topic(prefix, &accessory.zone_id, accessory.kind, "config"),
            payload: serde_json::to_string(accessory).ok()?,
            retain: true,
        }),
        BusEvent::CharacteristicUpdated {
            zone_id,
            kind,
            characteristic,
        } => Some(OutgoingMessage {
            topic: state_topic(prefix, zone_id, *kind, characteristic.name()),
            payload: render_value(&characteristic.value()),
            retain: true,
        }),
        BusEvent::CommandAcknowledged {
            zone_id,
            characteristic,
        } => Some(OutgoingMessage {
            topic: state_topic(prefix, zone_id, AccessoryKind::Speaker, characteristic.name()),
            payload: render_value(&characteristic.value()),
            retain: true,
        }),
        BusEvent::ZoneHostChanged { zone_id, host } => Some(OutgoingMessage {
            topic: format!("{}/zones/{}/host", prefix, zone_id),
            payload: host.clone(),
            retain: true,
        }),
        BusEvent::ShuttingDown { reason } => Some(OutgoingMessage {
            topic: format!("{}/system/shutdown", prefix),
            payload: json!({ "shutting_down": true, "reason": reason }).to_string(),
            retain: false,
        }),
        // Renames show up as configured_name updates; commands are inputs
        BusEvent::AccessoryRenamed { .. } | BusEvent::CommandReceived { .. } => None,
    }
}

/// Internal state
struct MqttState {
    host: Option<String>,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    topic_prefix: String,
    connected: bool,
}

impl Default for MqttState {
    fn default() -> Self {
        let defaults = MqttConfig::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            username: None,
            password: None,
            topic_prefix: defaults.topic_prefix,
            connected: false,
        }
    }
}

/// MQTT Adapter
pub struct MqttAdapter {
    state: Arc<RwLock<MqttState>>,
    client: Arc<RwLock<Option<AsyncClient>>>,
    bus: SharedBus,
    shutdown: CancellationToken,
}

impl MqttAdapter {
    pub fn new(bus: SharedBus) -> Self {
        Self {
            state: Arc::new(RwLock::new(MqttState::default())),
            client: Arc::new(RwLock::new(None)),
            bus,
            shutdown: CancellationToken::new(),
        }
    }

    /// Configure the MQTT connection
    pub async fn configure(&self, config: &MqttConfig) {
        let mut state = self.state.write().await;
        state.host = config.host.clone();
        state.port = config.port;
        state.username = config.username.clone();
        state.password = config.password.clone();
        state.topic_prefix = config.topic_prefix.clone();
    }

    /// Check if configured
    pub async fn is_configured(&self) -> bool {
        self.state.read().await.host.is_some()
    }

    /// Get connection status
    pub async fn get_status(&self) -> MqttStatus {
        let state = self.state.read().await;
        MqttStatus {
            connected: state.connected,
            host: state.host.clone(),
            port: state.port,
            topic_prefix: state.topic_prefix.clone(),
        }
    }

    /// Start MQTT connection and bridge
    pub async fn start(&self) -> Result<()> {
        let (host, port, username, password, topic_prefix) = {
            let state = self.state.read().await;
            let host = state
                .host
                .clone()
                .ok_or_else(|| anyhow!("MQTT host not configured"))?;
            (
                host,
                state.port,
                state.username.clone(),
                state.password.clone(),
                state.topic_prefix.clone(),
            )
        };

        let mut options = MqttOptions::new(CLIENT_ID, &host, port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(user), Some(pass)) = (&username, &password) {
            options.set_credentials(user, pass);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 100);

        {
            let mut client_guard = self.client.write().await;
            *client_guard = Some(client.clone());
        }

        tracing::info!("MQTT connecting to {}:{}...", host, port);

        // Event loop: (re)subscribe on every ConnAck, turn set-topics into commands
        let state = self.state.clone();
        let bus = self.bus.clone();
        let prefix = topic_prefix.clone();
        let shutdown = self.shutdown.clone();
        let control_topic = format!("{}/zones/+/set/+", topic_prefix);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("MQTT event loop shutting down");
                        break;
                    }
                    result = eventloop.poll() => {
                        match result {
                            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                                let payload = String::from_utf8_lossy(&publish.payload);
                                let Some((zone_id, characteristic)) =
                                    parse_control_topic(&prefix, &publish.topic)
                                else {
                                    tracing::debug!("Ignoring MQTT message on {}", publish.topic);
                                    continue;
                                };

                                match parse_command(characteristic, &payload) {
                                    Some(command) => bus.publish(BusEvent::CommandReceived {
                                        zone_id: zone_id.to_string(),
                                        command,
                                    }),
                                    None => tracing::warn!(
                                        "Invalid MQTT command on {}: {}",
                                        publish.topic,
                                        payload
                                    ),
                                }
                            }
                            Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                                tracing::info!("MQTT connected (code: {:?})", ack.code);
                                state.write().await.connected = true;
                                request_control_subscription(&client, &control_topic);
                            }
                            Ok(Event::Incoming(Incoming::Disconnect)) => {
                                tracing::warn!("MQTT disconnected");
                                state.write().await.connected = false;
                            }
                            Err(e) => {
                                tracing::error!("MQTT error: {}", e);
                                state.write().await.connected = false;
                                // Check shutdown before sleeping
                                tokio::select! {
                                    _ = shutdown.cancelled() => break,
                                    _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        });

        // Bus forwarder
        let client_clone = self.client.clone();
        let bus_clone = self.bus.clone();
        let prefix_clone = topic_prefix;
        let shutdown2 = self.shutdown.clone();
        let mut rx = bus_clone.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown2.cancelled() => {
                        tracing::info!("MQTT bus forwarder shutting down");
                        break;
                    }
                    result = rx.recv() => {
                        match result {
                            Ok(event) => {
                                let Some(message) = outgoing_message(&prefix_clone, &event) else {
                                    continue;
                                };
                                let client = client_clone.read().await.clone();
                                if let Some(client) = client {
                                    if let Err(e) = Self::send(&client, &message).await {
                                        tracing::debug!(
                                            "MQTT publish of {} to {} failed: {}",
                                            event.event_type(),
                                            message.topic,
                                            e
                                        );
                                    }
                                }
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                tracing::warn!("MQTT forwarder lagged {} events", n);
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });

        Ok(())
    }

    async fn send(client: &AsyncClient, message: &OutgoingMessage) -> Result<()> {
        client
            .publish(
                &message.topic,
                QoS::AtMostOnce,
                message.retain,
                message.payload.as_bytes(),
            )
            .await?;
        Ok(())
    }

    /// Stop MQTT connection
    pub async fn stop(&self) {
        // Cancel background tasks first
        self.shutdown.cancel();

        let client = self.client.write().await.take();
        if let Some(c) = client {
            let _ = c.disconnect().await;
        }

        self.state.write().await.connected = false;

        tracing::info!("MQTT adapter stopped");
    }
}
