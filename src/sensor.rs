//! Playback sensor: a read-only "is playing" projection of a zone's
//! transport status, exposed as a contact sensor so it can drive
//! automations.

use crate::translate::TransportStatus;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorMirror {
    playing: bool,
}

impl SensorMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Recompute from a freshly pushed status.
    /// Returns the new value only when it changed.
    pub fn apply(&mut self, status: TransportStatus) -> Option<bool> {
        let playing = status == TransportStatus::Play;
        if playing == self.playing {
            return None;
        }
        self.playing = playing;
        Some(playing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_not_playing() {
        assert!(!SensorMirror::new().is_playing());
    }

    #[test]
    fn test_transitions() {
        let mut sensor = SensorMirror::new();

        assert_eq!(sensor.apply(TransportStatus::Stop), None);
        assert_eq!(sensor.apply(TransportStatus::Play), Some(true));
        assert_eq!(sensor.apply(TransportStatus::Play), None);
        assert_eq!(sensor.apply(TransportStatus::Pause), Some(false));
        assert_eq!(sensor.apply(TransportStatus::Stop), None);
        assert!(!sensor.is_playing());
    }
}
