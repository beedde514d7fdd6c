//! Zone registry: turns roster snapshots into registered accessories.
//!
//! Identity is the zone id. Host and name changes are applied to the
//! existing entry, never by re-registering it. Zones that disappear from the
//! roster stay registered: published accessories cannot be retracted.

use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, info};

use crate::accessory::{AccessoryHost, AccessoryInfo};
use crate::error::ZoneError;
use crate::protocol::{RosterSnapshot, ZoneDescriptor};
use crate::reconciler::{ZoneChannels, ZoneReconciler};
use crate::translate::prettify;

/// What one discovery pass did, by zone id.
/// Rejected entries that had no usable id are listed as `#<index>`.
/// A rejected zone appears in no other list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub added: Vec<String>,
    pub host_updates: Vec<String>,
    pub name_updates: Vec<String>,
    pub rejected: Vec<String>,
}

impl DiscoveryReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.host_updates.is_empty()
            && self.name_updates.is_empty()
            && self.rejected.is_empty()
    }
}

pub struct ZoneRegistry {
    zones: HashMap<String, ZoneReconciler>,
    channels: ZoneChannels,
    with_sensor: bool,
}

impl ZoneRegistry {
    pub fn new(channels: ZoneChannels, with_sensor: bool) -> Self {
        Self {
            zones: HashMap::new(),
            channels,
            with_sensor,
        }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn get(&self, zone_id: &str) -> Option<&ZoneReconciler> {
        self.zones.get(zone_id)
    }

    pub fn get_mut(&mut self, zone_id: &str) -> Option<&mut ZoneReconciler> {
        self.zones.get_mut(zone_id)
    }

    pub fn zone_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.zones.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Process one `pushMultiRoomDevices` payload.
    ///
    /// Each entry is handled on its own: a bad entry is logged and skipped,
    /// the rest of the snapshot still applies. A payload that is not a
    /// roster at all fails the whole pass (logged, nothing changes).
    pub fn discover_zones(&mut self, payload: Value, host: &mut dyn AccessoryHost) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        let snapshot = match RosterSnapshot::from_value(payload) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Fatal: roster push is not a device list: {}", e);
                return report;
            }
        };
        debug!("Roster push with {} entries", snapshot.list.len());

        let mut seen = Vec::with_capacity(snapshot.list.len());
        for (index, raw) in snapshot.list.into_iter().enumerate() {
            debug!("Received zone data: {}", raw);

            let descriptor = match decode_descriptor(&raw) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    error!("Could not read zone entry #{}: {}", index, e);
                    report.rejected.push(format!("#{}", index));
                    continue;
                }
            };

            seen.push(descriptor.id.clone());
            if let Err(e) = self.apply_descriptor(&descriptor, host, &mut report) {
                error!("Could not apply zone {}: {}", descriptor.id, e);
                report.rejected.push(descriptor.id.clone());
            }
        }

        let absent = self.zones.keys().filter(|id| !seen.contains(*id)).count();
        if absent > 0 {
            debug!("{} registered zone(s) missing from roster, keeping them", absent);
        }

        report
    }

    fn apply_descriptor(
        &mut self,
        descriptor: &ZoneDescriptor,
        host: &mut dyn AccessoryHost,
        report: &mut DiscoveryReport,
    ) -> Result<(), ZoneError> {
        let zone_host = descriptor
            .host()
            .ok_or_else(|| ZoneError::MissingHost(descriptor.id.clone()))?;
        let display_name = prettify(&descriptor.name);

        if !self.zones.contains_key(&descriptor.id) {
            self.add_zone(descriptor, zone_host, &display_name, host)?;
            report.added.push(descriptor.id.clone());
            return Ok(());
        }
        let Some(zone) = self.zones.get_mut(&descriptor.id) else {
            return Ok(());
        };

        debug!(
            zone = %zone.display_name(),
            "Incoming name {:?} ({:?}), host {}; stored host {}",
            descriptor.name,
            display_name,
            zone_host,
            zone.host()
        );

        // A refused host rejects the whole entry, name included
        if zone.host() != zone_host {
            zone.update_host(zone_host)?;
            report.host_updates.push(descriptor.id.clone());
        }

        if zone.display_name() != display_name {
            zone.update_display_name(&display_name, host);
            report.name_updates.push(descriptor.id.clone());
        }

        Ok(())
    }

    fn add_zone(
        &mut self,
        descriptor: &ZoneDescriptor,
        zone_host: &str,
        display_name: &str,
        host: &mut dyn AccessoryHost,
    ) -> Result<(), ZoneError> {
        let zone = ZoneReconciler::new(
            &descriptor.id,
            zone_host,
            display_name,
            self.channels.clone(),
            self.with_sensor,
        )?;

        host.publish(&AccessoryInfo::speaker(&descriptor.id, display_name));
        if zone.has_sensor() {
            host.publish(&AccessoryInfo::sensor(&descriptor.id, display_name));
        }
        zone.announce(host);

        info!(zone = %display_name, "{} added at {}", display_name, zone_host);
        self.zones.insert(descriptor.id.clone(), zone);
        Ok(())
    }

    /// Close every zone channel
    pub fn close_all(&mut self) {
        for zone in self.zones.values_mut() {
            zone.close();
        }
    }
}

fn decode_descriptor(raw: &Value) -> Result<ZoneDescriptor, ZoneError> {
    let descriptor: ZoneDescriptor = serde_json::from_value(raw.clone())
        .map_err(|e| ZoneError::Malformed(format!("{} in {}", e, raw)))?;
    if descriptor.id.trim().is_empty() {
        return Err(ZoneError::Malformed(format!("empty id in {}", raw)));
    }
    Ok(descriptor)
}
