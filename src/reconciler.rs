//! Per-zone state reconciliation.
//!
//! A [`ZoneReconciler`] owns the zone's channel and its last known
//! [`ZoneState`]. Pushes from the zone are diffed against the cache and only
//! changed characteristics go to the accessory host. Commands from the
//! accessory side update the cache optimistically and are sent upstream
//! fire-and-forget.
//!
//! Nothing in here blocks or awaits. Channel handlers only forward into a
//! [`ZoneSink`]; the bridge loop calls back into the reconciler.

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::accessory::{AccessoryHost, AccessoryKind, Characteristic};
use crate::channel::{log_lifecycle, Channel, Connector, LifecycleEvent};
use crate::error::ChannelError;
use crate::protocol::{PlayerState, CMD_MUTE, CMD_UNMUTE, CMD_VOLUME, EVENT_GET_STATE, EVENT_PUSH_STATE};
use crate::sensor::SensorMirror;
use crate::translate::{
    clamp_volume, normalize_stream_flag, to_raw_command, to_transport_status, TransportStatus,
};

/// Last known state of a zone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ZoneState {
    pub status: TransportStatus,
    pub volume: u8,
    pub muted: bool,
    pub is_stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Disconnected,
    /// Channel open, waiting for the first full state
    Connecting,
    Synced,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Synced => write!(f, "synced"),
        }
    }
}

/// Where zone channel handlers deliver their input.
///
/// Called from transport tasks: implementations must not block.
pub trait ZoneSink: Send + Sync {
    fn zone_state(&self, zone_id: &str, generation: u64, payload: Value);

    fn zone_lifecycle(&self, zone_id: &str, generation: u64, event: LifecycleEvent);
}

/// Opens zone channels with their handlers wired to a [`ZoneSink`]
#[derive(Clone)]
pub struct ZoneChannels {
    connector: Arc<dyn Connector>,
    port: u16,
    sink: Arc<dyn ZoneSink>,
}

impl ZoneChannels {
    pub fn new(connector: Arc<dyn Connector>, port: u16, sink: Arc<dyn ZoneSink>) -> Self {
        Self {
            connector,
            port,
            sink,
        }
    }

    /// Open, register handlers tagged with `generation`, then connect
    pub fn open(
        &self,
        zone_id: &str,
        host: &str,
        generation: u64,
    ) -> Result<Box<dyn Channel>, ChannelError> {
        let mut channel = self.connector.open(host, self.port)?;

        let sink = self.sink.clone();
        let id = zone_id.to_string();
        channel.on(
            EVENT_PUSH_STATE,
            Box::new(move |payload| sink.zone_state(&id, generation, payload)),
        );

        let sink = self.sink.clone();
        let id = zone_id.to_string();
        channel.on_lifecycle(Box::new(move |event| {
            sink.zone_lifecycle(&id, generation, event.clone())
        }));

        channel.connect();
        Ok(channel)
    }
}

pub struct ZoneReconciler {
    zone_id: String,
    display_name: String,
    host: String,
    state: ZoneState,
    phase: SyncPhase,
    /// Tag of the current channel; inputs from older channels are dropped
    generation: u64,
    channel: Box<dyn Channel>,
    channels: ZoneChannels,
    sensor: Option<SensorMirror>,
}

impl ZoneReconciler {
    /// Open the zone's channel and start in `Connecting` with default state
    pub fn new(
        zone_id: &str,
        host: &str,
        display_name: &str,
        channels: ZoneChannels,
        with_sensor: bool,
    ) -> Result<Self, ChannelError> {
        let generation = 1;
        let channel = channels.open(zone_id, host, generation)?;

        Ok(Self {
            zone_id: zone_id.to_string(),
            display_name: display_name.to_string(),
            host: host.to_string(),
            state: ZoneState::default(),
            phase: SyncPhase::Connecting,
            generation,
            channel,
            channels,
            sensor: with_sensor.then(SensorMirror::new),
        })
    }

    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    pub fn state(&self) -> ZoneState {
        self.state
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_sensor(&self) -> bool {
        self.sensor.is_some()
    }

    pub fn sensor_playing(&self) -> Option<bool> {
        self.sensor.as_ref().map(SensorMirror::is_playing)
    }

    /// Push the name and the whole cache, right after the accessories
    /// were published
    pub fn announce(&self, host: &mut dyn AccessoryHost) {
        let zone = self.zone_id.as_str();
        let speaker = AccessoryKind::Speaker;
        host.update(
            zone,
            speaker,
            &Characteristic::ConfiguredName(self.display_name.clone()),
        );
        host.update(zone, speaker, &Characteristic::CurrentMediaState(self.state.status));
        host.update(zone, speaker, &Characteristic::Volume(self.state.volume));
        host.update(zone, speaker, &Characteristic::Mute(self.state.muted));

        if let Some(sensor) = &self.sensor {
            host.update(
                zone,
                AccessoryKind::Sensor,
                &Characteristic::ConfiguredName(self.display_name.clone()),
            );
            host.update(
                zone,
                AccessoryKind::Sensor,
                &Characteristic::ContactSensorState(sensor.is_playing()),
            );
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        if generation != self.generation {
            debug!(
                zone = %self.display_name,
                "Dropping input from stale channel (generation {} != {})",
                generation, self.generation
            );
            return false;
        }
        true
    }

    /// Transport lifecycle. Never touches the cached state.
    pub fn handle_lifecycle(&mut self, generation: u64, event: &LifecycleEvent) {
        if !self.is_current(generation) {
            return;
        }
        log_lifecycle(&self.display_name, self.channel.endpoint(), event);

        match event {
            LifecycleEvent::Connected => {
                self.phase = SyncPhase::Connecting;
                self.request_state();
            }
            LifecycleEvent::Disconnected { .. } | LifecycleEvent::ReconnectFailed => {
                self.phase = SyncPhase::Disconnected;
            }
            _ => {}
        }
    }

    fn request_state(&self) {
        if let Err(e) = self.channel.emit(EVENT_GET_STATE, None) {
            warn!(zone = %self.display_name, "Failed to request state: {}", e);
        }
    }

    /// A `pushState` from the zone
    pub fn handle_push(&mut self, generation: u64, payload: Value, host: &mut dyn AccessoryHost) {
        if !self.is_current(generation) {
            return;
        }
        debug!(zone = %self.display_name, "Received state push: {}", payload);

        let pushed: PlayerState = match serde_json::from_value(payload) {
            Ok(state) => state,
            Err(e) => {
                warn!(zone = %self.display_name, "Ignoring malformed state push: {}", e);
                return;
            }
        };
        if let Some(now_playing) = pushed.now_playing() {
            debug!(zone = %self.display_name, "Now playing: {}", now_playing);
        }

        let incoming = ZoneState {
            status: to_transport_status(pushed.status.as_deref()),
            volume: pushed.volume.map(clamp_volume).unwrap_or(self.state.volume),
            muted: pushed.mute.unwrap_or(self.state.muted),
            is_stream: normalize_stream_flag(pushed.stream.as_ref()),
        };
        debug!(zone = %self.display_name, "Cached {:?}, incoming {:?}", self.state, incoming);

        self.apply(incoming, host);

        if let Some(sensor) = self.sensor.as_mut() {
            if let Some(playing) = sensor.apply(incoming.status) {
                debug!(zone = %self.display_name, "Updating sensor state: {}", playing);
                host.update(
                    &self.zone_id,
                    AccessoryKind::Sensor,
                    &Characteristic::ContactSensorState(playing),
                );
            }
        }

        if self.phase != SyncPhase::Synced {
            info!(zone = %self.display_name, "Synced ({})", self.state.status);
            self.phase = SyncPhase::Synced;
        }
    }

    // Overwrites the cache and notifies one characteristic per changed field.
    // The baseline after a (re)connect is applied the same way, since the
    // host still shows the previous cache.
    fn apply(&mut self, incoming: ZoneState, host: &mut dyn AccessoryHost) {
        let previous = std::mem::replace(&mut self.state, incoming);
        let zone = self.zone_id.as_str();

        if previous.is_stream != incoming.is_stream {
            debug!(zone = %self.display_name, "Updating isStream: {}", incoming.is_stream);
        }
        if previous.status != incoming.status {
            debug!(zone = %self.display_name, "Updating status: {}", incoming.status);
            host.update(
                zone,
                AccessoryKind::Speaker,
                &Characteristic::CurrentMediaState(incoming.status),
            );
        }
        if previous.volume != incoming.volume {
            debug!(zone = %self.display_name, "Updating volume: {}", incoming.volume);
            host.update(zone, AccessoryKind::Speaker, &Characteristic::Volume(incoming.volume));
        }
        if previous.muted != incoming.muted {
            debug!(zone = %self.display_name, "Updating muted: {}", incoming.muted);
            host.update(zone, AccessoryKind::Speaker, &Characteristic::Mute(incoming.muted));
        }
    }

    fn send(&self, event: &str, payload: Option<Value>) {
        if let Err(e) = self.channel.emit(event, payload) {
            warn!(zone = %self.display_name, "Failed to send {}: {}", event, e);
        }
    }

    /// Set TargetMediaState. Pause on a stream is sent as stop, and the
    /// acknowledged (cached) value says so.
    pub fn set_target_state(&mut self, raw: u8, host: &mut dyn AccessoryHost) -> Characteristic {
        debug!(zone = %self.display_name, "SET TargetMediaState: {}", raw);

        let mut status = TransportStatus::from_characteristic(raw);
        if self.state.is_stream && status == TransportStatus::Pause {
            info!(zone = %self.display_name, "Looks like a stream, sending stop instead of pause");
            status = TransportStatus::Stop;
        }

        self.send(to_raw_command(status), None);

        let previous = std::mem::replace(&mut self.state.status, status);
        if previous != status {
            host.update(
                &self.zone_id,
                AccessoryKind::Speaker,
                &Characteristic::CurrentMediaState(status),
            );
        }
        Characteristic::TargetMediaState(status)
    }

    pub fn set_volume(&mut self, volume: f64) -> Characteristic {
        debug!(zone = %self.display_name, "SET Volume: {}", volume);
        self.state.volume = clamp_volume(volume);
        self.send(CMD_VOLUME, Some(json!(self.state.volume)));
        Characteristic::Volume(self.state.volume)
    }

    pub fn set_mute(&mut self, muted: bool) -> Characteristic {
        debug!(zone = %self.display_name, "SET Mute: {}", muted);
        self.state.muted = muted;
        self.send(if muted { CMD_MUTE } else { CMD_UNMUTE }, None);
        Characteristic::Mute(muted)
    }

    /// Move the zone to a new host: the old channel is closed, a fresh one is
    /// opened and the state is pulled again once it connects. The cache is
    /// kept until then.
    pub fn update_host(&mut self, host: &str) -> Result<(), ChannelError> {
        info!(zone = %self.display_name, "Updating host to: {}", host);

        let generation = self.generation + 1;
        let channel = self.channels.open(&self.zone_id, host, generation)?;

        // From here on, anything still queued from the old channel is stale
        self.generation = generation;
        let mut old = std::mem::replace(&mut self.channel, channel);
        old.close();

        self.host = host.to_string();
        self.phase = SyncPhase::Connecting;
        Ok(())
    }

    pub fn update_display_name(&mut self, display_name: &str, host: &mut dyn AccessoryHost) {
        info!(zone = %self.display_name, "Updating display name to: {}", display_name);
        self.display_name = display_name.to_string();

        let name = Characteristic::ConfiguredName(self.display_name.clone());
        host.rename(&self.zone_id, AccessoryKind::Speaker, &self.display_name);
        host.update(&self.zone_id, AccessoryKind::Speaker, &name);
        if self.sensor.is_some() {
            host.rename(&self.zone_id, AccessoryKind::Sensor, &self.display_name);
            host.update(&self.zone_id, AccessoryKind::Sensor, &name);
        }
    }

    pub fn close(&mut self) {
        self.channel.close();
        self.phase = SyncPhase::Disconnected;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::accessory::AccessoryInfo;
    use crate::channel::memory::MemoryConnector;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        updates: Vec<(AccessoryKind, Characteristic)>,
        renames: Vec<(AccessoryKind, String)>,
    }

    impl AccessoryHost for RecordingHost {
        fn publish(&mut self, _accessory: &AccessoryInfo) {}

        fn update(&mut self, _zone_id: &str, kind: AccessoryKind, characteristic: &Characteristic) {
            self.updates.push((kind, characteristic.clone()));
        }

        fn rename(&mut self, _zone_id: &str, kind: AccessoryKind, display_name: &str) {
            self.renames.push((kind, display_name.to_string()));
        }
    }

    #[derive(Default)]
    struct QueueSink {
        states: Mutex<Vec<(u64, Value)>>,
    }

    impl ZoneSink for QueueSink {
        fn zone_state(&self, _zone_id: &str, generation: u64, payload: Value) {
            self.states.lock().push((generation, payload));
        }

        fn zone_lifecycle(&self, _zone_id: &str, _generation: u64, _event: LifecycleEvent) {}
    }

    fn setup(with_sensor: bool) -> (ZoneReconciler, MemoryConnector, Arc<QueueSink>) {
        let connector = MemoryConnector::new();
        let sink = Arc::new(QueueSink::default());
        let channels = ZoneChannels::new(Arc::new(connector.clone()), 3000, sink.clone());
        let reconciler =
            ZoneReconciler::new("zone-1", "10.0.0.5", "Kitchen", channels, with_sensor).unwrap();
        (reconciler, connector, sink)
    }

    fn push(reconciler: &mut ZoneReconciler, host: &mut RecordingHost, payload: Value) {
        let generation = reconciler.generation();
        reconciler.handle_push(generation, payload, host);
    }

    #[test]
    fn test_starts_connecting_with_default_state() {
        let (reconciler, connector, _) = setup(false);
        assert_eq!(reconciler.phase(), SyncPhase::Connecting);
        assert_eq!(
            reconciler.state(),
            ZoneState {
                status: TransportStatus::Pause,
                volume: 0,
                muted: false,
                is_stream: false,
            }
        );
        let channel = connector.latest("10.0.0.5").unwrap();
        assert!(channel.is_connected());
        assert!(channel.has_handler(EVENT_PUSH_STATE));
    }

    #[test]
    fn test_connected_pulls_state() {
        let (mut reconciler, connector, _) = setup(false);
        reconciler.handle_lifecycle(reconciler.generation(), &LifecycleEvent::Connected);

        let channel = connector.latest("10.0.0.5").unwrap();
        assert_eq!(channel.emitted_named(EVENT_GET_STATE).len(), 1);
    }

    #[test]
    fn test_baseline_then_idempotent() {
        let (mut reconciler, _, _) = setup(false);
        let mut host = RecordingHost::default();
        let payload = json!({ "status": "play", "volume": 40, "mute": false });

        push(&mut reconciler, &mut host, payload.clone());
        assert_eq!(reconciler.phase(), SyncPhase::Synced);
        assert_eq!(
            host.updates,
            vec![
                (
                    AccessoryKind::Speaker,
                    Characteristic::CurrentMediaState(TransportStatus::Play)
                ),
                (AccessoryKind::Speaker, Characteristic::Volume(40)),
            ]
        );

        host.updates.clear();
        push(&mut reconciler, &mut host, payload);
        assert!(host.updates.is_empty());
    }

    #[test]
    fn test_push_clamps_volume() {
        let (mut reconciler, _, _) = setup(false);
        let mut host = RecordingHost::default();
        push(&mut reconciler, &mut host, json!({ "status": "stop", "volume": 180.2 }));
        assert_eq!(reconciler.state().volume, 100);
    }

    #[test]
    fn test_missing_fields() {
        let (mut reconciler, _, _) = setup(false);
        let mut host = RecordingHost::default();
        push(
            &mut reconciler,
            &mut host,
            json!({ "status": "play", "volume": 30, "mute": true, "stream": "webradio" }),
        );
        host.updates.clear();

        // volume/mute keep the cache, status and stream fall back
        push(&mut reconciler, &mut host, json!({}));
        let state = reconciler.state();
        assert_eq!(state.volume, 30);
        assert!(state.muted);
        assert!(!state.is_stream);
        assert_eq!(state.status, TransportStatus::Stop);
        assert_eq!(
            host.updates,
            vec![(
                AccessoryKind::Speaker,
                Characteristic::CurrentMediaState(TransportStatus::Stop)
            )]
        );
    }

    #[test]
    fn test_malformed_push_is_ignored() {
        let (mut reconciler, _, _) = setup(false);
        let mut host = RecordingHost::default();
        push(&mut reconciler, &mut host, json!("not a state"));
        assert!(host.updates.is_empty());
        assert_eq!(reconciler.phase(), SyncPhase::Connecting);
    }

    #[test]
    fn test_odd_info_fields_do_not_drop_push() {
        let (mut reconciler, _, _) = setup(false);
        let mut host = RecordingHost::default();
        push(
            &mut reconciler,
            &mut host,
            json!({ "status": "play", "volume": 40, "mute": false, "title": 1999 }),
        );

        assert_eq!(reconciler.phase(), SyncPhase::Synced);
        assert_eq!(
            reconciler.state(),
            ZoneState {
                status: TransportStatus::Play,
                volume: 40,
                muted: false,
                is_stream: false,
            }
        );
        assert_eq!(
            host.updates,
            vec![
                (
                    AccessoryKind::Speaker,
                    Characteristic::CurrentMediaState(TransportStatus::Play)
                ),
                (AccessoryKind::Speaker, Characteristic::Volume(40)),
            ]
        );
    }

    #[test]
    fn test_stream_pause_becomes_stop() {
        let (mut reconciler, connector, _) = setup(false);
        let mut host = RecordingHost::default();
        push(&mut reconciler, &mut host, json!({ "status": "play", "stream": true }));
        host.updates.clear();

        let ack = reconciler.set_target_state(TransportStatus::Pause.characteristic_value(), &mut host);
        assert_eq!(ack, Characteristic::TargetMediaState(TransportStatus::Stop));
        assert_eq!(reconciler.state().status, TransportStatus::Stop);

        let channel = connector.latest("10.0.0.5").unwrap();
        assert_eq!(channel.emitted_named("stop").len(), 1);
        assert!(channel.emitted_named("pause").is_empty());
        assert_eq!(
            host.updates,
            vec![(
                AccessoryKind::Speaker,
                Characteristic::CurrentMediaState(TransportStatus::Stop)
            )]
        );
    }

    #[test]
    fn test_pause_without_stream() {
        let (mut reconciler, connector, _) = setup(false);
        let mut host = RecordingHost::default();
        push(&mut reconciler, &mut host, json!({ "status": "play" }));

        let ack = reconciler.set_target_state(1, &mut host);
        assert_eq!(ack, Characteristic::TargetMediaState(TransportStatus::Pause));
        let channel = connector.latest("10.0.0.5").unwrap();
        assert_eq!(channel.emitted_named("pause").len(), 1);
    }

    #[test]
    fn test_set_same_state_sends_but_does_not_notify() {
        let (mut reconciler, connector, _) = setup(false);
        let mut host = RecordingHost::default();

        // Default cache is Pause
        reconciler.set_target_state(1, &mut host);
        assert!(host.updates.is_empty());
        let channel = connector.latest("10.0.0.5").unwrap();
        assert_eq!(channel.emitted_named("pause").len(), 1);
    }

    #[test]
    fn test_volume_and_mute_commands() {
        let (mut reconciler, connector, _) = setup(false);

        assert_eq!(reconciler.set_volume(120.0), Characteristic::Volume(100));
        assert_eq!(reconciler.set_volume(33.4), Characteristic::Volume(33));
        assert_eq!(reconciler.set_mute(true), Characteristic::Mute(true));
        assert_eq!(reconciler.set_mute(false), Characteristic::Mute(false));

        let channel = connector.latest("10.0.0.5").unwrap();
        let volumes: Vec<_> = channel
            .emitted_named(CMD_VOLUME)
            .into_iter()
            .map(|f| f.payload)
            .collect();
        assert_eq!(volumes, vec![Some(json!(100)), Some(json!(33))]);
        assert_eq!(channel.emitted_named(CMD_MUTE).len(), 1);
        assert_eq!(channel.emitted_named(CMD_UNMUTE).len(), 1);
        assert_eq!(reconciler.state().volume, 33);
    }

    #[test]
    fn test_update_host_drops_stale_input() {
        let (mut reconciler, connector, sink) = setup(false);
        let mut host = RecordingHost::default();
        push(&mut reconciler, &mut host, json!({ "status": "play", "volume": 20 }));
        let old_generation = reconciler.generation();
        let old_channel = connector.latest("10.0.0.5").unwrap();

        reconciler.update_host("10.0.0.9").unwrap();
        assert_eq!(reconciler.host(), "10.0.0.9");
        assert_eq!(reconciler.phase(), SyncPhase::Connecting);
        assert!(old_channel.is_closed());
        // Old handlers are gone
        assert!(!old_channel.fire(EVENT_PUSH_STATE, json!({ "status": "stop" })));

        // Cache survives the switch
        assert_eq!(reconciler.state().status, TransportStatus::Play);

        // An input queued before the switch is dropped
        host.updates.clear();
        reconciler.handle_push(old_generation, json!({ "status": "stop" }), &mut host);
        assert!(host.updates.is_empty());
        assert_eq!(reconciler.state().status, TransportStatus::Play);

        // The new channel delivers with the new generation
        let new_channel = connector.latest("10.0.0.9").unwrap();
        assert!(new_channel.fire(EVENT_PUSH_STATE, json!({ "status": "pause" })));
        let (generation, _) = sink.states.lock().last().cloned().unwrap();
        assert_eq!(generation, reconciler.generation());
        assert_ne!(generation, old_generation);
    }

    #[test]
    fn test_update_host_failure_keeps_old_channel() {
        let (mut reconciler, connector, _) = setup(false);
        connector.refuse("bad-host");
        let generation = reconciler.generation();

        assert!(reconciler.update_host("bad-host").is_err());
        assert_eq!(reconciler.host(), "10.0.0.5");
        assert_eq!(reconciler.generation(), generation);
        assert!(!connector.latest("10.0.0.5").unwrap().is_closed());
    }

    #[test]
    fn test_disconnect_keeps_cache() {
        let (mut reconciler, _, _) = setup(false);
        let mut host = RecordingHost::default();
        push(&mut reconciler, &mut host, json!({ "status": "play", "volume": 55 }));

        reconciler.handle_lifecycle(
            reconciler.generation(),
            &LifecycleEvent::Disconnected {
                reason: "transport close".to_string(),
            },
        );
        assert_eq!(reconciler.phase(), SyncPhase::Disconnected);
        assert_eq!(reconciler.state().volume, 55);
    }

    #[test]
    fn test_sensor_follows_pushes() {
        let (mut reconciler, _, _) = setup(true);
        let mut host = RecordingHost::default();

        push(&mut reconciler, &mut host, json!({ "status": "play" }));
        push(&mut reconciler, &mut host, json!({ "status": "play" }));
        push(&mut reconciler, &mut host, json!({ "status": "pause" }));

        let sensor_updates: Vec<_> = host
            .updates
            .iter()
            .filter(|(kind, _)| *kind == AccessoryKind::Sensor)
            .map(|(_, c)| c.clone())
            .collect();
        assert_eq!(
            sensor_updates,
            vec![
                Characteristic::ContactSensorState(true),
                Characteristic::ContactSensorState(false),
            ]
        );
        assert_eq!(reconciler.sensor_playing(), Some(false));
    }

    #[test]
    fn test_update_display_name() {
        let (mut reconciler, _, _) = setup(true);
        let mut host = RecordingHost::default();

        reconciler.update_display_name("Dining Room", &mut host);
        assert_eq!(reconciler.display_name(), "Dining Room");
        assert_eq!(
            host.renames,
            vec![
                (AccessoryKind::Speaker, "Dining Room".to_string()),
                (AccessoryKind::Sensor, "Dining Room".to_string()),
            ]
        );
        assert!(host.updates.contains(&(
            AccessoryKind::Speaker,
            Characteristic::ConfiguredName("Dining Room".to_string())
        )));
    }
}
