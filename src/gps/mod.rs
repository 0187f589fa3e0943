// src/gps/mod.rs
//! NMEA capture, decoding and telemetry aggregation

pub mod assembler;
pub mod data;
pub mod fix;
pub mod nmea;
pub mod pipeline;
pub mod queue;
pub mod rx;
pub mod satellites;

pub use data::{GpsData, Satellite};
pub use pipeline::{FixStatus, SentencePipeline};
