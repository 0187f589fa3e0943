// src/display/mod.rs
//! Renderer collaborators consuming published telemetry

pub mod indicator;
pub mod terminal;

pub use indicator::StatusIndicator;
pub use terminal::TerminalDisplay;
