// src/main.rs
//! GPS Telemetry - decode an NMEA receiver into a live dashboard or JSON lines

use anyhow::Context;
use clap::Parser;
use gps_telemetry::{
    config::{GpsConfig, IndicatorKind, OutputMode},
    monitor, GpsMonitor,
};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "gps-telemetry", version, about)]
struct Args {
    /// Serial port the receiver is attached to
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Replay a captured NMEA log instead of opening a port
    #[arg(short, long, conflicts_with = "port")]
    replay: Option<PathBuf>,

    /// Print one JSON object per published snapshot instead of the dashboard
    #[arg(long)]
    json: bool,

    /// Fix indicator shown on the dashboard
    #[arg(long, value_enum)]
    indicator: Option<IndicatorKind>,

    /// Do not send the antenna-reporting configuration commands
    #[arg(long)]
    no_antenna_commands: bool,

    /// Sleep between polls of an empty line queue, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Save the resulting configuration as the new default
    #[arg(long)]
    save_config: bool,
}

impl Args {
    fn apply(&self, config: &mut GpsConfig) {
        if let Some(port) = &self.port {
            let baud = self.baud.unwrap_or(config.serial_baudrate);
            config.update_serial(port.clone(), baud);
        } else if let Some(baud) = self.baud {
            config.serial_baudrate = baud;
        }
        if let Some(path) = &self.replay {
            config.update_replay(path.clone());
        }
        if self.json {
            config.output = OutputMode::Json;
        }
        if let Some(kind) = self.indicator {
            config.indicator = kind;
        }
        if self.no_antenna_commands {
            config.antenna_commands = false;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if args.list_ports {
        monitor::list_serial_ports()?;
        return Ok(());
    }

    let mut config = match GpsConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("{}; using defaults", e);
            GpsConfig::default()
        }
    };
    args.apply(&mut config);

    if args.save_config {
        config.save().context("saving configuration")?;
        log::info!("Configuration saved");
    }

    let monitor = GpsMonitor::new(config);
    monitor.run().await.context("running GPS telemetry")?;
    Ok(())
}
