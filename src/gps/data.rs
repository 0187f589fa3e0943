// src/gps/data.rs
//! Telemetry snapshot and satellite records

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Satellite map keyed by PRN; a repeated report for the same PRN replaces
/// the earlier one.
pub type SatelliteMap = BTreeMap<u16, Satellite>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Satellite {
    pub prn: u16,
    pub elevation: u8,       // degrees, 0-90
    pub azimuth: u16,        // degrees, 0-359
    pub signal_strength: u8, // dB-Hz, 0 when not reported
}

impl Satellite {
    pub fn new(prn: u16, elevation: u8, azimuth: u16, signal_strength: u8) -> Self {
        Self {
            prn,
            elevation,
            azimuth,
            signal_strength,
        }
    }

    /// A satellite reported without signal strength is visible but not tracked.
    pub fn is_tracked(&self) -> bool {
        self.signal_strength > 0
    }
}

/// Accumulator for one reporting cycle, handed to the data callback by value
/// once the cycle's recommended-minimum sentence has been decoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GpsData {
    pub time: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub speed_knots: Option<String>,
    pub altitude_meters: Option<String>,
    pub satellite_count_text: Option<String>,
    pub fix_mode_text: Option<String>,
    pub satellites: SatelliteMap,
    pub used_prns: Vec<u16>,
    pub external_antenna: bool,
    /// Wall-clock time of publication, stamped by the publisher.
    pub published_at: Option<DateTime<Utc>>,
}

impl GpsData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new cycle carrying over the previous cycle's visibility map
    /// and the sticky antenna state.
    pub fn seeded(satellites: SatelliteMap, external_antenna: bool) -> Self {
        Self {
            satellites,
            external_antenna,
            ..Self::default()
        }
    }

    /// Drop all visibility information, visible and used.
    pub fn clear_satellites(&mut self) {
        self.satellites.clear();
        self.used_prns.clear();
    }

    /// Check whether a satellite contributes to the current fix
    pub fn is_used(&self, prn: u16) -> bool {
        self.used_prns.contains(&prn)
    }

    /// Number of visible satellites that are also used for the fix
    pub fn satellites_used(&self) -> usize {
        self.satellites
            .keys()
            .filter(|prn| self.is_used(**prn))
            .count()
    }

    /// Check if the snapshot carries a position
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Get the age of the snapshot in seconds
    pub fn age_seconds(&self) -> Option<i64> {
        self.published_at
            .map(|ts| Utc::now().signed_duration_since(ts).num_seconds())
    }

    /// Format optional display text, falling back to a placeholder
    pub fn display_or<'a>(value: &'a Option<String>, placeholder: &'a str) -> &'a str {
        value.as_deref().unwrap_or(placeholder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_keeps_satellites_only() {
        let mut sats = SatelliteMap::new();
        sats.insert(7, Satellite::new(7, 45, 120, 38));

        let data = GpsData::seeded(sats, false);
        assert_eq!(data.satellites.len(), 1);
        assert!(data.used_prns.is_empty());
        assert!(data.time.is_none());
        assert!(!data.external_antenna);
    }

    #[test]
    fn test_satellites_used_counts_visible_only() {
        let mut data = GpsData::new();
        data.satellites.insert(1, Satellite::new(1, 40, 83, 46));
        data.satellites.insert(2, Satellite::new(2, 17, 308, 0));
        data.used_prns = vec![1, 9];

        assert_eq!(data.satellites_used(), 1);
        assert!(data.is_used(9));
        assert!(!data.satellites[&2].is_tracked());
    }

    #[test]
    fn test_display_or() {
        let data = GpsData::new();
        assert_eq!(GpsData::display_or(&data.time, "--:--:--"), "--:--:--");
    }
}
