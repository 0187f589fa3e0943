// src/gps/fix.rs
//! Decoding of time, position, speed, altitude and antenna fields into
//! display-ready strings

use super::data::GpsData;
use super::nmea::field;

// RMC field positions
const RMC_TIME: usize = 1;
const RMC_STATUS: usize = 2;
const RMC_LAT: usize = 3;
const RMC_LAT_HEMI: usize = 4;
const RMC_LON: usize = 5;
const RMC_LON_HEMI: usize = 6;
const RMC_SPEED: usize = 7;

// GGA field positions
const GGA_NUM_SATS: usize = 7;
const GGA_ALTITUDE: usize = 9;

const ANTENNA_STATUS: usize = 2;

const LAT_WIDTH: usize = 7;
const LON_WIDTH: usize = 8;

/// Fix flags raised or lowered by a recommended-minimum sentence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RmcFlags {
    pub time_fix: bool,
    /// `Some(valid)` when the sentence settled the position fix; `None` when
    /// it was marked valid but lacked coordinates.
    pub position_fix: Option<bool>,
}

/// Receiver variants reporting antenna status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntennaVariant {
    /// `$PGTOP`: 2 = internal, 3 = external
    Pa6h,
    /// `$PCD`: 1 = internal, 2 = external
    Pa1616s,
}

/// Apply a GPRMC sentence to the accumulator.
///
/// With an invalid status the coordinate strings already in `data` are left
/// as they are; only the fix flag drops.
pub fn apply_rmc(fields: &[&str], data: &mut GpsData) -> RmcFlags {
    let mut flags = RmcFlags::default();

    data.time = field(fields, RMC_TIME).and_then(format_time);
    flags.time_fix = data.time.is_some();

    if field(fields, RMC_STATUS) == Some("A") {
        let coords = (
            field(fields, RMC_LAT),
            field(fields, RMC_LAT_HEMI),
            field(fields, RMC_LON),
            field(fields, RMC_LON_HEMI),
        );
        if let (Some(lat), Some(ns), Some(lon), Some(ew)) = coords {
            if let (Some(lat), Some(lon)) = (
                convert_to_degrees(lat, LAT_WIDTH),
                convert_to_degrees(lon, LON_WIDTH),
            ) {
                data.latitude = Some(lat + ns);
                data.longitude = Some(lon + ew);
                flags.position_fix = Some(true);
            }
        }
        if let Some(knots) = field(fields, RMC_SPEED).and_then(|s| s.parse::<f64>().ok()) {
            data.speed_knots = Some(format_speed(knots));
        }
    } else {
        flags.position_fix = Some(false);
    }

    flags
}

/// Apply a GPGGA sentence: satellites in use and altitude.
pub fn apply_gga(fields: &[&str], data: &mut GpsData) {
    if let Some(count) = field(fields, GGA_NUM_SATS) {
        data.satellite_count_text = Some(format!("Sat: {}", count));
    }
    if let Some(meters) = field(fields, GGA_ALTITUDE).and_then(|s| s.parse::<f64>().ok()) {
        data.altitude_meters = Some(format_altitude(meters));
    }
}

/// Decode an antenna status sentence. `None` leaves the current state alone.
pub fn antenna_status(variant: AntennaVariant, fields: &[&str]) -> Option<bool> {
    match (variant, field(fields, ANTENNA_STATUS)?) {
        (AntennaVariant::Pa6h, "2") => Some(false),
        (AntennaVariant::Pa6h, "3") => Some(true),
        (AntennaVariant::Pa1616s, "1") => Some(false),
        (AntennaVariant::Pa1616s, "2") => Some(true),
        _ => None,
    }
}

/// `HHMMSS[.sss]` to `HH:MM:SSZ`
pub fn format_time(raw: &str) -> Option<String> {
    let hh = raw.get(0..2)?;
    let mm = raw.get(2..4)?;
    let ss = raw.get(4..6)?;
    Some(format!("{}:{}:{}Z", hh, mm, ss))
}

/// `(D)DDMM.mmmm` to decimal degrees, 4 decimals, right-aligned to `width`
pub fn convert_to_degrees(raw: &str, width: usize) -> Option<String> {
    let value: f64 = raw.parse().ok()?;
    let degrees = (value / 100.0).floor();
    let minutes = value - degrees * 100.0;
    let converted = degrees + minutes / 60.0;
    Some(format!("{:>width$.4}", converted, width = width))
}

/// Knots with one decimal below 10, whole knots from there on
pub fn format_speed(knots: f64) -> String {
    format!("{}kn", two_tier(knots, 10.0))
}

/// Meters with one decimal below 1000, whole meters from there on
pub fn format_altitude(meters: f64) -> String {
    format!("{}m", two_tier(meters, 1000.0))
}

fn two_tier(value: f64, threshold: f64) -> String {
    if value < threshold {
        format!("{:.1}", value)
    } else {
        // f64::round goes half away from zero; `{:.0}` alone would round half to even
        format!("{:.0}", value.round())
    }
}
