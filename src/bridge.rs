//! Bridge event loop
//!
//! One task owns the registry, every reconciler and the roster channel.
//! Channel handlers and the bus only feed the inbox; all state changes
//! happen here, one input at a time. Per-zone ordering follows from the
//! inbox being FIFO, and a slow or dead zone never blocks the others since
//! nothing in the loop waits on the network.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::accessory::{AccessoryHost, SpeakerCommand};
use crate::bus::{BusEvent, SharedBus};
use crate::channel::{log_lifecycle, Channel, Connector, LifecycleEvent};
use crate::protocol::{DEFAULT_PORT, EVENT_GET_ROSTER, EVENT_PUSH_ROSTER};
use crate::reconciler::{ZoneChannels, ZoneSink};
use crate::registry::{DiscoveryReport, ZoneRegistry};

/// Inbox capacity; inputs beyond this are dropped with a warning
pub const INBOX_CAPACITY: usize = 1024;

const ROSTER_LABEL: &str = "roster";

/// Everything the loop reacts to
#[derive(Debug, Clone)]
pub enum BridgeInput {
    Roster(Value),
    RosterLifecycle(LifecycleEvent),
    ZoneState {
        zone_id: String,
        generation: u64,
        payload: Value,
    },
    ZoneLifecycle {
        zone_id: String,
        generation: u64,
        event: LifecycleEvent,
    },
    Command {
        zone_id: String,
        command: SpeakerCommand,
    },
}

impl BridgeInput {
    fn kind(&self) -> &'static str {
        match self {
            Self::Roster(_) => "roster",
            Self::RosterLifecycle(_) => "roster lifecycle",
            Self::ZoneState { .. } => "zone state",
            Self::ZoneLifecycle { .. } => "zone lifecycle",
            Self::Command { .. } => "command",
        }
    }
}

/// Non-blocking handle onto the inbox
#[derive(Clone)]
pub struct InboxSink {
    tx: mpsc::Sender<BridgeInput>,
}

impl InboxSink {
    pub fn new(tx: mpsc::Sender<BridgeInput>) -> Self {
        Self { tx }
    }

    pub fn push(&self, input: BridgeInput) {
        match self.tx.try_send(input) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(input)) => {
                warn!("Bridge inbox full, dropping {} input", input.kind());
            }
            Err(mpsc::error::TrySendError::Closed(input)) => {
                debug!("Bridge stopped, dropping {} input", input.kind());
            }
        }
    }
}

impl ZoneSink for InboxSink {
    fn zone_state(&self, zone_id: &str, generation: u64, payload: Value) {
        self.push(BridgeInput::ZoneState {
            zone_id: zone_id.to_string(),
            generation,
            payload,
        });
    }

    fn zone_lifecycle(&self, zone_id: &str, generation: u64, event: LifecycleEvent) {
        self.push(BridgeInput::ZoneLifecycle {
            zone_id: zone_id.to_string(),
            generation,
            event,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Roster server. Without it the bridge runs but discovers nothing.
    pub server_url: Option<String>,
    /// Port of the roster server and of every zone
    pub server_port: u16,
    pub playback_sensor: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            server_url: None,
            server_port: DEFAULT_PORT,
            playback_sensor: false,
        }
    }
}

pub struct Bridge {
    options: BridgeOptions,
    connector: Arc<dyn Connector>,
    bus: SharedBus,
    host: Box<dyn AccessoryHost>,
    registry: ZoneRegistry,
    roster: Option<Box<dyn Channel>>,
    sink: InboxSink,
    inbox: Option<mpsc::Receiver<BridgeInput>>,
}

impl Bridge {
    pub fn new(
        options: BridgeOptions,
        connector: Arc<dyn Connector>,
        bus: SharedBus,
        host: Box<dyn AccessoryHost>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let sink = InboxSink::new(tx);
        let channels = ZoneChannels::new(
            connector.clone(),
            options.server_port,
            Arc::new(sink.clone()),
        );

        Self {
            registry: ZoneRegistry::new(channels, options.playback_sensor),
            options,
            connector,
            bus,
            host,
            roster: None,
            sink,
            inbox: Some(rx),
        }
    }

    /// Sender side of the inbox
    pub fn sink(&self) -> InboxSink {
        self.sink.clone()
    }

    pub fn registry(&self) -> &ZoneRegistry {
        &self.registry
    }

    /// Open the roster channel. Logs and does nothing if no server is
    /// configured or the address is unusable.
    pub fn start(&mut self) {
        if self.roster.is_some() {
            return;
        }
        let Some(server_url) = self.options.server_url.clone() else {
            error!("Could not set up socket for roster: serverURL not set in config");
            return;
        };

        let mut channel = match self.connector.open(&server_url, self.options.server_port) {
            Ok(channel) => channel,
            Err(e) => {
                error!("Could not set up socket for roster: {}", e);
                return;
            }
        };

        let sink = self.sink.clone();
        channel.on(
            EVENT_PUSH_ROSTER,
            Box::new(move |payload| sink.push(BridgeInput::Roster(payload))),
        );
        let sink = self.sink.clone();
        channel.on_lifecycle(Box::new(move |event| {
            sink.push(BridgeInput::RosterLifecycle(event.clone()))
        }));
        channel.connect();

        info!("Discovering Volumio zones at {}...", channel.endpoint());
        self.roster = Some(channel);
    }

    /// Apply one input
    pub fn handle(&mut self, input: BridgeInput) {
        match input {
            BridgeInput::Roster(payload) => {
                let report = self.registry.discover_zones(payload, self.host.as_mut());
                self.after_discovery(&report);
            }
            BridgeInput::RosterLifecycle(event) => self.handle_roster_lifecycle(&event),
            BridgeInput::ZoneState {
                zone_id,
                generation,
                payload,
            } => match self.registry.get_mut(&zone_id) {
                Some(zone) => zone.handle_push(generation, payload, self.host.as_mut()),
                None => debug!("State push for unknown zone {}", zone_id),
            },
            BridgeInput::ZoneLifecycle {
                zone_id,
                generation,
                event,
            } => match self.registry.get_mut(&zone_id) {
                Some(zone) => zone.handle_lifecycle(generation, &event),
                None => debug!("Lifecycle event for unknown zone {}", zone_id),
            },
            BridgeInput::Command { zone_id, command } => self.handle_command(&zone_id, command),
        }
    }

    fn handle_roster_lifecycle(&mut self, event: &LifecycleEvent) {
        let Some(roster) = self.roster.as_ref() else {
            return;
        };
        log_lifecycle(ROSTER_LABEL, roster.endpoint(), event);

        if *event == LifecycleEvent::Connected {
            if let Err(e) = roster.emit(EVENT_GET_ROSTER, None) {
                warn!("Failed to request zone roster: {}", e);
            }
        }
    }

    fn after_discovery(&self, report: &DiscoveryReport) {
        for zone_id in &report.host_updates {
            if let Some(zone) = self.registry.get(zone_id) {
                self.bus.publish(BusEvent::ZoneHostChanged {
                    zone_id: zone_id.clone(),
                    host: zone.host().to_string(),
                });
            }
        }
        if !report.is_empty() {
            info!(
                "Discovery: {} added, {} moved, {} renamed, {} rejected ({} zones)",
                report.added.len(),
                report.host_updates.len(),
                report.name_updates.len(),
                report.rejected.len(),
                self.registry.len()
            );
        }
    }

    fn handle_command(&mut self, zone_id: &str, command: SpeakerCommand) {
        let Some(zone) = self.registry.get_mut(zone_id) else {
            warn!("Command for unknown zone {}: {:?}", zone_id, command);
            return;
        };

        let characteristic = match command {
            SpeakerCommand::SetTargetMediaState(raw) => {
                zone.set_target_state(raw, self.host.as_mut())
            }
            SpeakerCommand::SetVolume(volume) => zone.set_volume(volume),
            SpeakerCommand::SetMute(muted) => zone.set_mute(muted),
        };

        self.bus.publish(BusEvent::CommandAcknowledged {
            zone_id: zone_id.to_string(),
            characteristic,
        });
    }

    /// Run until `shutdown` fires. Opens the roster channel first.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let Some(mut inbox) = self.inbox.take() else {
            error!("Bridge loop already ran");
            return;
        };
        let mut bus_rx = self.bus.subscribe();

        self.start();
        info!("Bridge started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                input = inbox.recv() => match input {
                    Some(input) => self.handle(input),
                    None => break,
                },

                event = bus_rx.recv() => match event {
                    Ok(BusEvent::CommandReceived { zone_id, command }) => {
                        self.handle(BridgeInput::Command { zone_id, command });
                    }
                    Ok(BusEvent::ShuttingDown { .. }) => break,
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => warn!("Bridge lagged {} bus events", n),
                    Err(RecvError::Closed) => break,
                },
            }
        }

        self.shutdown();
    }

    /// Close the roster channel and every zone channel
    pub fn shutdown(&mut self) {
        if let Some(mut roster) = self.roster.take() {
            roster.close();
        }
        self.registry.close_all();
        info!("Bridge stopped");
    }
}
