// src/display/terminal.rs
//! Terminal dashboard rendering the latest published snapshot

use super::indicator::{Rgb, StatusIndicator};
use crate::{
    error::{GpsError, Result},
    gps::{FixStatus, GpsData},
    monitor::TelemetryView,
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::time::sleep;

pub struct TerminalDisplay {
    indicator: StatusIndicator,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self {
            indicator: StatusIndicator::default(),
        }
    }

    pub fn with_indicator(indicator: StatusIndicator) -> Self {
        Self { indicator }
    }

    /// Redraw once a second until `running` drops
    pub async fn run(
        mut self,
        view: Arc<RwLock<TelemetryView>>,
        status: Arc<FixStatus>,
        running: Arc<AtomicBool>,
    ) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Hide, DisableLineWrap).map_err(GpsError::Io)?;

        while running.load(Ordering::Relaxed) {
            execute!(stdout, Clear(ClearType::All), MoveTo(0, 0)).map_err(GpsError::Io)?;

            let snapshot = match view.read() {
                Ok(guard) => guard.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            };
            self.indicator
                .show_fix(status.has_position_fix(), status.external_antenna());
            self.render(&mut stdout, &snapshot, &status)?;

            stdout.flush().map_err(GpsError::Io)?;
            sleep(Duration::from_secs(1)).await;
        }

        execute!(stdout, Show, EnableLineWrap).map_err(GpsError::Io)?;
        println!("\nShutting down...");
        Ok(())
    }

    /// Render the telemetry view
    pub fn render(&self, out: &mut impl Write, view: &TelemetryView, status: &FixStatus) -> Result<()> {
        execute!(
            out,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("GPS Telemetry"),
            Print("\n"),
            Print("=".repeat(60)),
            Print("\n"),
            ResetColor
        )
        .map_err(GpsError::Io)?;

        self.render_status_line(out, status)?;

        match &view.latest {
            Some(data) => {
                let age = data
                    .age_seconds()
                    .map(|s| format!("{}s ago", s))
                    .unwrap_or_else(|| "unknown".to_string());
                execute!(out, Print(format!("Last Update: {}\n\n", age))).map_err(GpsError::Io)?;
                self.render_fix_section(out, data)?;
                self.render_satellite_section(out, data)?;
            }
            None => {
                execute!(out, Print("Last Update: No data received\n\n")).map_err(GpsError::Io)?;
            }
        }

        self.render_raw_data_section(out, view)?;

        execute!(
            out,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("Press Ctrl+C to exit"),
            Print("\n"),
            ResetColor
        )
        .map_err(GpsError::Io)?;

        Ok(())
    }

    fn render_status_line(&self, out: &mut impl Write, status: &FixStatus) -> Result<()> {
        let (glyph, color) = match self.indicator.color() {
            Some(Rgb(r, g, b)) => ("●", Color::Rgb { r, g, b }),
            None => ("○", Color::DarkGrey),
        };
        let fix = if status.has_position_fix() { "FIX" } else { "NO FIX" };
        let antenna = if status.external_antenna() { "external" } else { "internal" };
        execute!(
            out,
            SetForegroundColor(color),
            Print(glyph),
            ResetColor,
            Print(format!(" {}  antenna: {}\n", fix, antenna))
        )
        .map_err(GpsError::Io)?;
        Ok(())
    }

    fn render_fix_section(&self, out: &mut impl Write, data: &GpsData) -> Result<()> {
        execute!(
            out,
            SetForegroundColor(Color::Yellow),
            Print("FIX:\n"),
            ResetColor
        )
        .map_err(GpsError::Io)?;

        let rows = [
            ("Time", GpsData::display_or(&data.time, "--:--:--Z")),
            ("Latitude", GpsData::display_or(&data.latitude, "No fix")),
            ("Longitude", GpsData::display_or(&data.longitude, "No fix")),
            ("Altitude", GpsData::display_or(&data.altitude_meters, "Unknown")),
            ("Speed", GpsData::display_or(&data.speed_knots, "Unknown")),
            ("Satellites", GpsData::display_or(&data.satellite_count_text, "Sat: -")),
            ("Mode", GpsData::display_or(&data.fix_mode_text, "Unknown")),
        ];
        for (label, value) in rows {
            execute!(out, Print(format!("  {:<11} {:>12}\n", label, value))).map_err(GpsError::Io)?;
        }
        execute!(out, Print("\n")).map_err(GpsError::Io)?;
        Ok(())
    }

    fn render_satellite_section(&self, out: &mut impl Write, data: &GpsData) -> Result<()> {
        execute!(
            out,
            SetForegroundColor(Color::Magenta),
            Print(format!(
                "SATELLITES ({} visible, {} used):\n",
                data.satellites.len(),
                data.satellites_used()
            )),
            ResetColor,
            Print("   PRN  Elev   Azim  SNR\n")
        )
        .map_err(GpsError::Io)?;

        for sat in data.satellites.values() {
            let color = if data.is_used(sat.prn) {
                Color::Green
            } else if sat.is_tracked() {
                Color::White
            } else {
                Color::DarkGrey
            };
            execute!(
                out,
                SetForegroundColor(color),
                Print(format!(
                    "  {:>4}  {:>4}°  {:>4}°  {:>3}\n",
                    sat.prn, sat.elevation, sat.azimuth, sat.signal_strength
                )),
                ResetColor
            )
            .map_err(GpsError::Io)?;
        }
        execute!(out, Print("\n")).map_err(GpsError::Io)?;
        Ok(())
    }

    fn render_raw_data_section(&self, out: &mut impl Write, view: &TelemetryView) -> Result<()> {
        execute!(
            out,
            SetForegroundColor(Color::Blue),
            Print("RAW DATA:\n"),
            ResetColor
        )
        .map_err(GpsError::Io)?;

        if view.raw_history.is_empty() {
            execute!(out, Print("  No data\n")).map_err(GpsError::Io)?;
        }
        for sentence in &view.raw_history {
            execute!(out, Print(format!("  {}\n", sentence))).map_err(GpsError::Io)?;
        }

        execute!(
            out,
            Print(format!(
                "\n  accepted {}  rejected {}  published {}  dropped {}  overflows {}  queue {}/{}\n\n",
                view.pipeline.accepted,
                view.pipeline.rejected_total(),
                view.pipeline.published,
                view.rx.lines_dropped,
                view.rx.overflows,
                view.queue_depth,
                view.queue_capacity
            ))
        )
        .map_err(GpsError::Io)?;

        Ok(())
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::{nmea::frame, SentencePipeline};

    #[test]
    fn test_render_with_snapshot() {
        let mut pipeline = SentencePipeline::new();
        let latest = Arc::new(RwLock::new(None));
        let sink = Arc::clone(&latest);
        pipeline.set_data_callback(move |data| *sink.write().unwrap() = Some(data));
        for body in [
            "GPGSV,1,1,02,01,40,083,46,02,17,308,",
            "GPGSA,A,3,01,,,,,,,,,,,,2.5,1.3,2.1",
            "GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W",
        ] {
            pipeline.process_line(frame(body).as_bytes());
        }

        let mut view = TelemetryView::default();
        view.latest = latest.read().unwrap().clone();
        view.raw_history.push_back("GPRMC,123519,A".to_string());

        let status = pipeline.status();
        let mut display = TerminalDisplay::new();
        display.indicator.show_fix(status.has_position_fix(), status.external_antenna());

        let mut out = Vec::new();
        display.render(&mut out, &view, &status).unwrap();
        let text = String::from_utf8_lossy(&out);

        assert!(text.contains("12:35:19Z"));
        assert!(text.contains("48.1173N"));
        assert!(text.contains("SATELLITES (2 visible, 1 used)"));
        assert!(text.contains("GPRMC,123519,A"));
        assert!(text.contains("FIX  antenna: external"));
    }

    #[test]
    fn test_render_without_data() {
        let pipeline = SentencePipeline::new();
        let display = TerminalDisplay::with_indicator(StatusIndicator::single(vec![]));
        let mut out = Vec::new();
        display
            .render(&mut out, &TelemetryView::default(), &pipeline.status())
            .unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("No data received"));
        assert!(text.contains("NO FIX"));
    }
}
