//! In-process channels.
//!
//! `MemoryConnector` hands out channels that never touch the network. Every
//! opened channel stays reachable through a [`MemoryChannelHandle`], which
//! lets a test play the Volumio side: fire events into the registered
//! handlers, raise lifecycle events, and inspect what the bridge emitted.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{Channel, Connector, EventHandler, LifecycleEvent, LifecycleHandler};
use crate::error::ChannelError;

/// A frame emitted by the bridge
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedFrame {
    pub event: String,
    pub payload: Option<Value>,
}

#[derive(Default)]
struct Shared {
    handlers: HashMap<String, Arc<EventHandler>>,
    lifecycle: Option<Arc<LifecycleHandler>>,
    emitted: Vec<EmittedFrame>,
    connected: bool,
    closed: bool,
}

/// Channel half owned by the bridge
pub struct MemoryChannel {
    endpoint: String,
    shared: Arc<Mutex<Shared>>,
}

/// Test-side view of an opened channel
#[derive(Clone)]
pub struct MemoryChannelHandle {
    host: String,
    port: u16,
    shared: Arc<Mutex<Shared>>,
}

impl MemoryChannelHandle {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Deliver `payload` to the handler registered for `event`.
    /// Returns false if no handler is registered (or the channel is closed).
    pub fn fire(&self, event: &str, payload: Value) -> bool {
        // Clone the handler out so it runs without the lock held
        let handler = {
            let shared = self.shared.lock();
            if shared.closed {
                return false;
            }
            shared.handlers.get(event).cloned()
        };
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }

    /// Deliver a lifecycle event to the registered lifecycle handler
    pub fn fire_lifecycle(&self, event: LifecycleEvent) -> bool {
        let handler = {
            let mut shared = self.shared.lock();
            if shared.closed {
                return false;
            }
            match event {
                LifecycleEvent::Connected => shared.connected = true,
                LifecycleEvent::Disconnected { .. } => shared.connected = false,
                _ => {}
            }
            shared.lifecycle.clone()
        };
        match handler {
            Some(handler) => {
                handler(&event);
                true
            }
            None => false,
        }
    }

    /// Everything emitted so far, oldest first
    pub fn emitted(&self) -> Vec<EmittedFrame> {
        self.shared.lock().emitted.clone()
    }

    /// Emitted frames for one event name
    pub fn emitted_named(&self, event: &str) -> Vec<EmittedFrame> {
        self.shared
            .lock()
            .emitted
            .iter()
            .filter(|f| f.event == event)
            .cloned()
            .collect()
    }

    pub fn clear_emitted(&self) {
        self.shared.lock().emitted.clear();
    }

    pub fn has_handler(&self, event: &str) -> bool {
        self.shared.lock().handlers.contains_key(event)
    }

    /// `connect()` was called and no disconnect has been simulated since
    pub fn is_connected(&self) -> bool {
        self.shared.lock().connected
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

impl Channel for MemoryChannel {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn on(&mut self, event: &str, handler: EventHandler) {
        self.shared
            .lock()
            .handlers
            .insert(event.to_string(), Arc::new(handler));
    }

    fn on_lifecycle(&mut self, handler: LifecycleHandler) {
        self.shared.lock().lifecycle = Some(Arc::new(handler));
    }

    fn off(&mut self, event: &str) {
        self.shared.lock().handlers.remove(event);
    }

    fn connect(&mut self) {
        let mut shared = self.shared.lock();
        if !shared.closed {
            shared.connected = true;
        }
    }

    fn emit(&self, event: &str, payload: Option<Value>) -> Result<(), ChannelError> {
        let mut shared = self.shared.lock();
        if shared.closed {
            return Err(ChannelError::Closed(self.endpoint.clone()));
        }
        shared.emitted.push(EmittedFrame {
            event: event.to_string(),
            payload,
        });
        Ok(())
    }

    fn close(&mut self) {
        let mut shared = self.shared.lock();
        shared.handlers.clear();
        shared.lifecycle = None;
        shared.connected = false;
        shared.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

#[derive(Default)]
struct ConnectorState {
    opened: Vec<MemoryChannelHandle>,
    refused: HashSet<String>,
}

/// Connector producing [`MemoryChannel`]s
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `open` fail for `host`
    pub fn refuse(&self, host: &str) {
        self.state.lock().refused.insert(host.to_string());
    }

    /// All channels ever opened, oldest first
    pub fn opened(&self) -> Vec<MemoryChannelHandle> {
        self.state.lock().opened.clone()
    }

    /// Most recently opened channel for `host`
    pub fn latest(&self, host: &str) -> Option<MemoryChannelHandle> {
        self.state
            .lock()
            .opened
            .iter()
            .rev()
            .find(|h| h.host == host)
            .cloned()
    }

    /// How many channels have been opened for `host`
    pub fn open_count(&self, host: &str) -> usize {
        self.state
            .lock()
            .opened
            .iter()
            .filter(|h| h.host == host)
            .count()
    }
}

impl Connector for MemoryConnector {
    fn open(&self, host: &str, port: u16) -> Result<Box<dyn Channel>, ChannelError> {
        let mut state = self.state.lock();
        if state.refused.contains(host) {
            return Err(ChannelError::InvalidEndpoint {
                host: host.to_string(),
                reason: "refused".to_string(),
            });
        }

        let shared = Arc::new(Mutex::new(Shared::default()));
        state.opened.push(MemoryChannelHandle {
            host: host.to_string(),
            port,
            shared: shared.clone(),
        });

        Ok(Box::new(MemoryChannel {
            endpoint: format!("memory://{}:{}", host, port),
            shared,
        }))
    }
}
