// src/lib.rs
//! GPS Telemetry Library
//!
//! Turns a stream of NMEA-0183 sentences from a positioning receiver into
//! display-ready telemetry snapshots, delivered through callbacks.
//!
//! Bytes enter through a statically bound receive slot ([`gps::rx`]), are
//! assembled into lines and queued, then validated, decoded and aggregated by
//! the [`SentencePipeline`] in the poll loop.

pub mod config;
pub mod display;
pub mod error;
pub mod gps;
pub mod monitor;

// Re-export main types for convenience
pub use error::{GpsError, Result, SentenceError};
pub use gps::{FixStatus, GpsData, Satellite, SentencePipeline};
pub use monitor::{GpsMonitor, GpsSource};
