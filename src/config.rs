// src/config.rs
//! Configuration stored as JSON under the user's config directory

use crate::error::{GpsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Terminal,
    Json,
}

/// Kind of fix indicator the dashboard drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    /// Plain LED: lit with a fix, dark without one
    Single,
    /// RGB pixel showing fix and antenna source by colour
    Addressable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    pub serial_port: Option<String>,
    pub serial_baudrate: u32,
    /// Captured NMEA log to replay instead of opening a port
    pub replay_file: Option<PathBuf>,
    pub output: OutputMode,
    pub indicator: IndicatorKind,
    /// Send the antenna-reporting commands after the first valid sentence
    pub antenna_commands: bool,
    /// Sleep between polls of an empty line queue
    pub poll_interval_ms: u64,
    /// Delay between lines when replaying, to mimic a receiver's pace
    pub replay_line_delay_ms: u64,
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            serial_port: None,
            serial_baudrate: 9600,
            replay_file: None,
            output: OutputMode::Terminal,
            indicator: IndicatorKind::Addressable,
            antenna_commands: true,
            poll_interval_ms: 1,
            replay_line_delay_ms: 100,
        }
    }
}

impl GpsConfig {
    /// Load configuration from the default location, or defaults if none is saved
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            log::debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| GpsError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| GpsError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GpsError::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)?;

        std::fs::write(config_path, contents)
            .map_err(|e| GpsError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| GpsError::Config("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("gps-telemetry")
            .join("config.json"))
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String, baudrate: u32) {
        self.serial_port = Some(port);
        self.serial_baudrate = baudrate;
        self.replay_file = None;
    }

    /// Replay a capture instead of reading a port
    pub fn update_replay(&mut self, path: PathBuf) {
        self.replay_file = Some(path);
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}
