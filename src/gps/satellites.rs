// src/gps/satellites.rs
//! Reassembly of multi-part satellite visibility reports
//!
//! A visibility group is a run of GSV sentences numbered `1..=N`. Part 1
//! clears the map and opens the group; part N closes it and stamps the
//! refresh time. Any other sentence arriving while a group is open means the
//! group was cut short, and a partial map is never shown: both the visible
//! and the used lists are cleared.
//!
//! Independently, visibility data that has not been refreshed within
//! [`STALENESS_WINDOW`] is cleared before the next sentence is applied.

use super::data::{GpsData, Satellite};
use super::nmea::field;
use std::time::{Duration, Instant};

pub const STALENESS_WINDOW: Duration = Duration::from_secs(30);

/// Satellite entries carried by one GSV part at most
pub const SATS_PER_PART: usize = 4;

// GSV field positions
const GSV_TOTAL_PARTS: usize = 1;
const GSV_PART_INDEX: usize = 2;
const GSV_TOTAL_SATS: usize = 3;
const GSV_FIRST_ENTRY: usize = 4;

// GSA field positions
const GSA_MODE: usize = 2;
const GSA_FIRST_PRN: usize = 3;
const GSA_PRN_SLOTS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Idle,
    CollectingGroup { total_parts: u8 },
}

/// What a visibility sentence did to the group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEvent {
    Started,
    Continued,
    Completed,
    /// Part arrived outside an open group and was ignored
    Ignored,
}

#[derive(Debug)]
pub struct SatelliteAggregator {
    state: GroupState,
    // Completion time of the last visibility group, or session start
    last_refresh: Instant,
}

impl SatelliteAggregator {
    pub fn new(now: Instant) -> Self {
        Self {
            state: GroupState::Idle,
            last_refresh: now,
        }
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self.state, GroupState::CollectingGroup { .. })
    }

    /// Clear visibility that outlived the staleness window. Runs before any
    /// sentence is applied; returns `true` when the window has run out.
    ///
    /// Only a completed group moves the window, so this keeps firing on every
    /// sentence until the receiver reports visibility again.
    pub fn evict_stale(&mut self, data: &mut GpsData, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_refresh) > STALENESS_WINDOW {
            if data.satellites.is_empty() && data.used_prns.is_empty() {
                return true;
            }
            log::debug!(
                "No satellite refresh in {:?}, clearing {} visible / {} used",
                STALENESS_WINDOW,
                data.satellites.len(),
                data.used_prns.len()
            );
            data.clear_satellites();
            true
        } else {
            false
        }
    }

    /// A non-visibility sentence arrived. An open group is abandoned and
    /// everything it would have replaced is cleared.
    pub fn interrupt(&mut self, data: &mut GpsData) -> bool {
        if let GroupState::CollectingGroup { total_parts } = self.state {
            log::debug!("Visibility group of {} parts interrupted", total_parts);
            data.clear_satellites();
            self.state = GroupState::Idle;
            true
        } else {
            false
        }
    }

    /// Apply one GSV sentence.
    pub fn on_visibility(&mut self, fields: &[&str], data: &mut GpsData, now: Instant) -> GroupEvent {
        let Some(part) = parse_num::<u8>(fields, GSV_PART_INDEX) else {
            return GroupEvent::Ignored;
        };

        let mut event = GroupEvent::Continued;
        if part == 1 {
            data.satellites.clear();
            let total_parts = parse_num::<u8>(fields, GSV_TOTAL_PARTS).unwrap_or(0);
            self.state = GroupState::CollectingGroup { total_parts };
            event = GroupEvent::Started;
        }

        let GroupState::CollectingGroup { total_parts } = self.state else {
            return GroupEvent::Ignored;
        };

        let total_sats = parse_num::<usize>(fields, GSV_TOTAL_SATS).unwrap_or(0);
        let entries = entries_in_part(total_sats, part);
        for n in 0..entries {
            let base = GSV_FIRST_ENTRY + n * 4;
            if let Some(sat) = parse_entry(fields, base) {
                data.satellites.insert(sat.prn, sat);
            }
        }

        if part == total_parts {
            self.state = GroupState::Idle;
            self.last_refresh = now;
            event = GroupEvent::Completed;
        }
        event
    }

    /// Apply one GSA sentence: rebuild the used list and the fix-mode text.
    pub fn on_dilution(&mut self, fields: &[&str], data: &mut GpsData) {
        data.used_prns.clear();
        for i in GSA_FIRST_PRN..GSA_FIRST_PRN + GSA_PRN_SLOTS {
            let Some(raw) = field(fields, i) else {
                break;
            };
            // Non-numeric or zero is not a PRN
            match raw.parse::<u16>() {
                Ok(prn) if prn != 0 => data.used_prns.push(prn),
                _ => {}
            }
        }

        data.fix_mode_text = field(fields, GSA_MODE).map(fix_mode_text);
    }
}

/// Display text for a GSA mode code
pub fn fix_mode_text(mode: &str) -> String {
    if mode == "1" {
        "No Fix".to_string()
    } else {
        format!("{}D Fix", mode)
    }
}

/// Number of entries part `part` carries when the group reports `total_sats`.
pub fn entries_in_part(total_sats: usize, part: u8) -> usize {
    let before = SATS_PER_PART * usize::from(part.saturating_sub(1));
    total_sats.saturating_sub(before).min(SATS_PER_PART)
}

fn parse_num<T: std::str::FromStr>(fields: &[&str], i: usize) -> Option<T> {
    field(fields, i).and_then(|f| f.parse().ok())
}

// id, elevation and azimuth are mandatory; strength defaults to 0
fn parse_entry(fields: &[&str], base: usize) -> Option<Satellite> {
    let prn = parse_num::<u16>(fields, base)?;
    let elevation = parse_num::<u8>(fields, base + 1)?;
    let azimuth = parse_num::<u16>(fields, base + 2)?;
    let signal_strength = parse_num::<u8>(fields, base + 3).unwrap_or(0);
    Some(Satellite::new(prn, elevation, azimuth, signal_strength))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::nmea::split_fields;

    fn gsv(agg: &mut SatelliteAggregator, data: &mut GpsData, body: &str, now: Instant) -> GroupEvent {
        agg.on_visibility(&split_fields(body), data, now)
    }

    #[test]
    fn test_three_part_group_collects_all_entries() {
        let t0 = Instant::now();
        let mut agg = SatelliteAggregator::new(t0);
        let mut data = GpsData::new();
        data.used_prns = vec![1, 2];

        assert_eq!(
            gsv(&mut agg, &mut data, "GPGSV,3,1,11,01,40,083,46,02,17,308,41,12,07,344,39,14,22,228,45", t0),
            GroupEvent::Started
        );
        assert!(agg.is_collecting());
        assert_eq!(
            gsv(&mut agg, &mut data, "GPGSV,3,2,11,15,10,100,,17,50,200,33,19,60,300,,22,05,010,12", t0),
            GroupEvent::Continued
        );
        assert_eq!(
            gsv(&mut agg, &mut data, "GPGSV,3,3,11,24,30,111,20,25,31,222,,28,32,333,40", t0),
            GroupEvent::Completed
        );

        assert_eq!(agg.state(), GroupState::Idle);
        assert_eq!(data.satellites.len(), 11);
        assert_eq!(data.satellites[&15].signal_strength, 0);
        assert_eq!(data.satellites[&28], Satellite::new(28, 32, 333, 40));
        // Visibility never touches the used list
        assert_eq!(data.used_prns, vec![1, 2]);
    }

    #[test]
    fn test_entries_missing_mandatory_fields_are_skipped() {
        let t0 = Instant::now();
        let mut agg = SatelliteAggregator::new(t0);
        let mut data = GpsData::new();

        gsv(&mut agg, &mut data, "GPGSV,1,1,04,01,40,083,46,02,,308,41,03,17,,41,,17,308,41", t0);
        assert_eq!(data.satellites.len(), 1);
        assert!(data.satellites.contains_key(&1));
    }

    #[test]
    fn test_declared_count_bounds_entries() {
        // Part 2 of a 6-satellite group carries two entries even if more follow
        assert_eq!(entries_in_part(6, 2), 2);
        assert_eq!(entries_in_part(12, 3), 4);
        assert_eq!(entries_in_part(3, 2), 0);
        assert_eq!(entries_in_part(20, 1), 4);

        let t0 = Instant::now();
        let mut agg = SatelliteAggregator::new(t0);
        let mut data = GpsData::new();
        gsv(&mut agg, &mut data, "GPGSV,2,1,06,01,40,083,46,02,17,308,41,03,07,344,39,04,22,228,45", t0);
        gsv(&mut agg, &mut data, "GPGSV,2,2,06,05,40,083,46,06,17,308,41,07,07,344,39", t0);
        assert_eq!(data.satellites.len(), 6);
        assert!(!data.satellites.contains_key(&7));
    }

    #[test]
    fn test_repeated_prn_overwrites() {
        let t0 = Instant::now();
        let mut agg = SatelliteAggregator::new(t0);
        let mut data = GpsData::new();
        gsv(&mut agg, &mut data, "GPGSV,2,1,05,01,40,083,46,02,17,308,41,03,07,344,39,04,22,228,45", t0);
        gsv(&mut agg, &mut data, "GPGSV,2,2,05,01,45,090,30", t0);
        assert_eq!(data.satellites.len(), 4);
        assert_eq!(data.satellites[&1], Satellite::new(1, 45, 90, 30));
    }

    #[test]
    fn test_part_outside_group_is_ignored() {
        let t0 = Instant::now();
        let mut agg = SatelliteAggregator::new(t0);
        let mut data = GpsData::new();
        assert_eq!(
            gsv(&mut agg, &mut data, "GPGSV,3,2,11,15,10,100,,17,50,200,33,19,60,300,,22,05,010,12", t0),
            GroupEvent::Ignored
        );
        assert!(data.satellites.is_empty());
        assert_eq!(gsv(&mut agg, &mut data, "GPGSV,3,,11", t0), GroupEvent::Ignored);
    }

    #[test]
    fn test_interrupt_clears_open_group_only() {
        let t0 = Instant::now();
        let mut agg = SatelliteAggregator::new(t0);
        let mut data = GpsData::new();
        data.used_prns = vec![3];

        assert!(!agg.interrupt(&mut data));
        gsv(&mut agg, &mut data, "GPGSV,3,1,11,01,40,083,46,02,17,308,41,12,07,344,39,14,22,228,45", t0);
        assert!(agg.interrupt(&mut data));
        assert!(data.satellites.is_empty());
        assert!(data.used_prns.is_empty());
        assert_eq!(agg.state(), GroupState::Idle);
    }

    #[test]
    fn test_staleness_window() {
        let t0 = Instant::now();
        let mut agg = SatelliteAggregator::new(t0);
        let mut data = GpsData::new();
        gsv(&mut agg, &mut data, "GPGSV,1,1,01,01,40,083,46", t0);
        data.used_prns = vec![1];

        assert!(!agg.evict_stale(&mut data, t0 + STALENESS_WINDOW));
        assert_eq!(data.satellites.len(), 1);

        let later = t0 + STALENESS_WINDOW + Duration::from_millis(1);
        assert!(agg.evict_stale(&mut data, later));
        assert!(data.satellites.is_empty());
        assert!(data.used_prns.is_empty());

        // Still stale until a group completes
        data.used_prns = vec![1];
        assert!(agg.evict_stale(&mut data, later + Duration::from_secs(1)));
        assert!(data.used_prns.is_empty());

        let refreshed = later + Duration::from_secs(2);
        gsv(&mut agg, &mut data, "GPGSV,1,1,01,01,40,083,46", refreshed);
        assert!(!agg.evict_stale(&mut data, refreshed + Duration::from_secs(1)));
        assert_eq!(data.satellites.len(), 1);
    }

    #[test]
    fn test_dilution_replaces_used_list() {
        let mut agg = SatelliteAggregator::new(Instant::now());
        let mut data = GpsData::new();
        data.used_prns = vec![30, 31];

        agg.on_dilution(&split_fields("GPGSA,A,3,04,05,00,09,x,,24,,,,,,2.5,1.3,2.1"), &mut data);
        assert_eq!(data.used_prns, vec![4, 5, 9]);
        assert_eq!(data.fix_mode_text.as_deref(), Some("3D Fix"));

        agg.on_dilution(&split_fields("GPGSA,A,1,,,,,,,,,,,,,,,"), &mut data);
        assert!(data.used_prns.is_empty());
        assert_eq!(data.fix_mode_text.as_deref(), Some("No Fix"));
    }

    #[test]
    fn test_fix_mode_text() {
        assert_eq!(fix_mode_text("1"), "No Fix");
        assert_eq!(fix_mode_text("2"), "2D Fix");
        assert_eq!(fix_mode_text("3"), "3D Fix");
    }
}
