//! SAFETY CRITICAL: Volume control regression tests
//!
//! Volumio takes an absolute 0-100 volume. Whatever the accessory side
//! asks for (fractional sliders, overshoot, garbage), the value sent to the
//! zone and the value acknowledged back must be the same bounded integer.

use serde_json::json;
use std::sync::Arc;

use volumio_speakers_bridge::accessory::{AccessoryHost, BusHost, Characteristic};
use volumio_speakers_bridge::bus::create_bus;
use volumio_speakers_bridge::channel::memory::{MemoryChannelHandle, MemoryConnector};
use volumio_speakers_bridge::protocol::CMD_VOLUME;
use volumio_speakers_bridge::reconciler::{ZoneChannels, ZoneReconciler, ZoneSink};
use volumio_speakers_bridge::translate::clamp_volume;

struct NullSink;

impl ZoneSink for NullSink {
    fn zone_state(&self, _zone_id: &str, _generation: u64, _payload: serde_json::Value) {}

    fn zone_lifecycle(
        &self,
        _zone_id: &str,
        _generation: u64,
        _event: volumio_speakers_bridge::channel::LifecycleEvent,
    ) {
    }
}

fn zone() -> (ZoneReconciler, MemoryChannelHandle) {
    let connector = MemoryConnector::new();
    let channels = ZoneChannels::new(Arc::new(connector.clone()), 3000, Arc::new(NullSink));
    let zone = ZoneReconciler::new("z1", "10.0.0.5", "Kitchen", channels, false)
        .expect("memory channel should open");
    let handle = connector.latest("10.0.0.5").expect("channel");
    (zone, handle)
}

fn host() -> Box<dyn AccessoryHost> {
    Box::new(BusHost::new(create_bus()))
}

// =============================================================================
// Translation
// =============================================================================

#[test]
fn in_range_values_pass_through() {
    assert_eq!(clamp_volume(0.0), 0);
    assert_eq!(clamp_volume(35.0), 35);
    assert_eq!(clamp_volume(100.0), 100);
}

#[test]
fn fractional_values_round_to_nearest() {
    assert_eq!(clamp_volume(41.4), 41);
    assert_eq!(clamp_volume(41.5), 42);
    assert_eq!(clamp_volume(99.6), 100);
}

#[test]
fn overshoot_saturates_at_100() {
    // Never wrap: 256 must not become 0 and 300 must not become 44
    assert_eq!(clamp_volume(101.0), 100);
    assert_eq!(clamp_volume(256.0), 100);
    assert_eq!(clamp_volume(300.0), 100);
    assert_eq!(clamp_volume(f64::INFINITY), 100);
}

#[test]
fn negative_values_saturate_at_0() {
    assert_eq!(clamp_volume(-0.4), 0);
    assert_eq!(clamp_volume(-12.0), 0);
    assert_eq!(clamp_volume(f64::NEG_INFINITY), 0);
}

#[test]
fn nan_is_silence() {
    assert_eq!(clamp_volume(f64::NAN), 0);
}

// =============================================================================
// Commands
// =============================================================================

#[test]
fn sent_volume_matches_acknowledged_volume() {
    let (mut zone, channel) = zone();

    for (requested, expected) in [(250.0, 100u8), (-3.0, 0), (12.6, 13)] {
        channel.clear_emitted();
        let ack = zone.set_volume(requested);

        assert_eq!(ack, Characteristic::Volume(expected));
        assert_eq!(zone.state().volume, expected);
        let sent = channel.emitted_named(CMD_VOLUME);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, Some(json!(expected)));
    }
}

#[test]
fn pushed_volume_out_of_range_is_clamped() {
    let (mut zone, _channel) = zone();
    let mut host = host();
    let generation = zone.generation();

    zone.handle_push(generation, json!({ "status": "play", "volume": 140 }), host.as_mut());
    assert_eq!(zone.state().volume, 100);

    zone.handle_push(generation, json!({ "status": "play", "volume": -5 }), host.as_mut());
    assert_eq!(zone.state().volume, 0);
}

#[test]
fn push_without_volume_keeps_last_known_level() {
    let (mut zone, _channel) = zone();
    let mut host = host();
    let generation = zone.generation();

    zone.handle_push(generation, json!({ "status": "play", "volume": 22 }), host.as_mut());
    zone.handle_push(generation, json!({ "status": "pause" }), host.as_mut());

    // A missing field must not read as 0 (or as anything else)
    assert_eq!(zone.state().volume, 22);
}
