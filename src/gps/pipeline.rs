// src/gps/pipeline.rs
//! Sentence pipeline: validation, decoding, aggregation and publication
//!
//! Owned by the poll loop. Each dequeued line goes through the validator,
//! the raw-sentence callback, the staleness check, the satellite aggregator
//! and the fix extractor. A recommended-minimum sentence closes the cycle:
//! the accumulator is moved into the data callback and a fresh one, seeded
//! with the cycle's satellite map, takes its place.

use super::data::GpsData;
use super::fix::{self, AntennaVariant};
use super::nmea::{self, SentenceKind, ANTENNA_COMMANDS};
use super::satellites::SatelliteAggregator;
use crate::error::SentenceError;
use chrono::Utc;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

/// Receives the checksum-stripped body of every validated sentence
pub type SentenceCallback = Box<dyn FnMut(&str) + Send>;

/// Receives each completed snapshot by value
pub type DataCallback = Box<dyn FnMut(GpsData) + Send>;

/// Latest fix state, readable from other tasks (the renderer) without
/// touching the pipeline.
#[derive(Debug)]
pub struct FixStatus {
    time_fix: AtomicBool,
    position_fix: AtomicBool,
    external_antenna: AtomicBool,
}

impl FixStatus {
    fn new() -> Self {
        Self {
            time_fix: AtomicBool::new(false),
            position_fix: AtomicBool::new(false),
            external_antenna: AtomicBool::new(true),
        }
    }

    pub fn has_time_fix(&self) -> bool {
        self.time_fix.load(Ordering::Relaxed)
    }

    pub fn has_position_fix(&self) -> bool {
        self.position_fix.load(Ordering::Relaxed)
    }

    pub fn external_antenna(&self) -> bool {
        self.external_antenna.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub accepted: u64,
    pub rejected: BTreeMap<&'static str, u64>,
    pub published: u64,
}

impl PipelineStats {
    pub fn rejected_total(&self) -> u64 {
        self.rejected.values().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandState {
    Waiting,
    Pending,
    Sent,
}

pub struct SentencePipeline {
    current: GpsData,
    aggregator: SatelliteAggregator,
    status: Arc<FixStatus>,
    commands: CommandState,
    sentence_callback: Option<SentenceCallback>,
    data_callback: Option<DataCallback>,
    stats: PipelineStats,
}

impl SentencePipeline {
    pub fn new() -> Self {
        Self::new_at(Instant::now())
    }

    /// Start a session whose monotonic clock origin is `now`
    pub fn new_at(now: Instant) -> Self {
        let status = Arc::new(FixStatus::new());
        Self {
            current: GpsData::seeded(Default::default(), status.external_antenna()),
            aggregator: SatelliteAggregator::new(now),
            status,
            commands: CommandState::Waiting,
            sentence_callback: None,
            data_callback: None,
            stats: PipelineStats::default(),
        }
    }

    /// Disable the antenna configuration commands for this session
    pub fn without_antenna_commands(mut self) -> Self {
        self.commands = CommandState::Sent;
        self
    }

    pub fn set_sentence_callback(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        log::debug!("Sentence callback registered");
        self.sentence_callback = Some(Box::new(callback));
    }

    pub fn set_data_callback(&mut self, callback: impl FnMut(GpsData) + Send + 'static) {
        log::debug!("Data callback registered");
        self.data_callback = Some(Box::new(callback));
    }

    /// Shared handle to the fix state
    pub fn status(&self) -> Arc<FixStatus> {
        Arc::clone(&self.status)
    }

    pub fn has_position_fix(&self) -> bool {
        self.status.has_position_fix()
    }

    pub fn has_time_fix(&self) -> bool {
        self.status.has_time_fix()
    }

    pub fn external_antenna(&self) -> bool {
        self.status.external_antenna()
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// The accumulator for the cycle in progress
    pub fn current(&self) -> &GpsData {
        &self.current
    }

    /// Antenna configuration commands, handed out once after the first valid
    /// sentence so the receiver has finished starting up.
    pub fn take_startup_commands(&mut self) -> Option<[&'static str; 2]> {
        if self.commands == CommandState::Pending {
            self.commands = CommandState::Sent;
            Some(ANTENNA_COMMANDS)
        } else {
            None
        }
    }

    pub fn process_line(&mut self, line: &[u8]) {
        self.process_line_at(line, Instant::now())
    }

    /// Process one received line with `now` as the monotonic clock reading.
    /// Failures are logged and the line dropped.
    pub fn process_line_at(&mut self, line: &[u8], now: Instant) {
        match nmea::validate(line) {
            Ok(sentence) => {
                self.stats.accepted += 1;
                self.apply(&sentence, now);
            }
            Err(e) => self.reject(e, line),
        }
    }

    fn reject(&mut self, error: SentenceError, line: &[u8]) {
        log::warn!(
            "Failed to validate NMEA sentence ({}): {}",
            error,
            String::from_utf8_lossy(line).trim_end()
        );
        *self.stats.rejected.entry(error.kind()).or_insert(0) += 1;
    }

    fn apply(&mut self, sentence: &nmea::ValidatedSentence, now: Instant) {
        log::trace!("{}", sentence.body());
        if let Some(callback) = self.sentence_callback.as_mut() {
            callback(sentence.body());
        }
        if self.commands == CommandState::Waiting {
            self.commands = CommandState::Pending;
        }

        let fields = sentence.fields();
        let data = &mut self.current;

        self.aggregator.evict_stale(data, now);

        let kind = sentence.kind();
        if kind == SentenceKind::Gsv {
            self.aggregator.on_visibility(&fields, data, now);
            return;
        }
        self.aggregator.interrupt(data);

        match kind {
            SentenceKind::Rmc => {
                let flags = fix::apply_rmc(&fields, data);
                self.status.time_fix.store(flags.time_fix, Ordering::Relaxed);
                if let Some(valid) = flags.position_fix {
                    self.status.position_fix.store(valid, Ordering::Relaxed);
                }
                self.publish();
            }
            SentenceKind::Gga => fix::apply_gga(&fields, data),
            SentenceKind::Gsa => self.aggregator.on_dilution(&fields, data),
            SentenceKind::Pgtop => self.set_antenna(AntennaVariant::Pa6h, &fields),
            SentenceKind::Pcd => self.set_antenna(AntennaVariant::Pa1616s, &fields),
            SentenceKind::Gsv | SentenceKind::Other => {}
        }
    }

    fn set_antenna(&mut self, variant: AntennaVariant, fields: &[&str]) {
        if let Some(external) = fix::antenna_status(variant, fields) {
            log::debug!(
                "Antenna source: {}",
                if external { "external" } else { "internal" }
            );
            self.status.external_antenna.store(external, Ordering::Relaxed);
            self.current.external_antenna = external;
        }
    }

    /// Close the cycle: move the accumulator out to the data callback and
    /// start the next one from this cycle's satellite map.
    fn publish(&mut self) {
        let carried = self.current.satellites.clone();
        let next = GpsData::seeded(carried, self.status.external_antenna());
        let mut snapshot = std::mem::replace(&mut self.current, next);
        snapshot.published_at = Some(Utc::now());
        self.stats.published += 1;

        log::debug!(
            "Publishing snapshot #{}: time {:?}, {} satellites, {} used",
            self.stats.published,
            snapshot.time,
            snapshot.satellites.len(),
            snapshot.used_prns.len()
        );
        if let Some(callback) = self.data_callback.as_mut() {
            callback(snapshot);
        }
    }
}

impl Default for SentencePipeline {
    fn default() -> Self {
        Self::new()
    }
}
