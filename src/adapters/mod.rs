//! Transport to Volumio (socket.io) and integrations (MQTT)

pub mod mqtt;
pub mod socketio;
