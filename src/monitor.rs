// src/monitor.rs
//! Runtime wiring: receiver source, receive task and poll loop
//!
//! The receive task stands in for the UART interrupt: it only moves bytes
//! into the statically bound receive slot. Everything after the line queue
//! runs in the poll loop, which owns the [`SentencePipeline`].

use crate::{
    config::{GpsConfig, OutputMode},
    display::terminal::TerminalDisplay,
    error::{GpsError, Result},
    gps::{
        assembler::RawLine,
        pipeline::PipelineStats,
        queue::{Consumer, Ringbuf},
        rx::{RxStats, GPS_RX, QUEUE_DEPTH},
        FixStatus, GpsData, SentencePipeline,
    },
};
use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc,
    time::sleep,
};
use tokio_serial::SerialPortBuilderExt;

/// Raw sentences kept for display
const RAW_HISTORY: usize = 5;

static LINE_QUEUE: Ringbuf<RawLine, QUEUE_DEPTH> = Ringbuf::new();

/// GPS data source configuration
#[derive(Debug, Clone)]
pub enum GpsSource {
    Serial { port: String, baudrate: u32 },
    Replay { path: PathBuf, line_delay: Duration },
}

impl GpsSource {
    pub fn from_config(config: &GpsConfig) -> Result<Self> {
        if let Some(path) = &config.replay_file {
            return Ok(GpsSource::Replay {
                path: path.clone(),
                line_delay: Duration::from_millis(config.replay_line_delay_ms),
            });
        }
        match &config.serial_port {
            Some(port) => Ok(GpsSource::Serial {
                port: port.clone(),
                baudrate: config.serial_baudrate,
            }),
            None => Err(GpsError::Config(
                "No serial port or replay file configured".to_string(),
            )),
        }
    }
}

/// What the renderer sees: the last published snapshot plus diagnostics
#[derive(Debug, Clone, Default)]
pub struct TelemetryView {
    pub latest: Option<GpsData>,
    pub raw_history: VecDeque<String>,
    pub pipeline: PipelineStats,
    pub rx: RxStats,
    /// Lines waiting in the handoff queue, and how many it holds
    pub queue_depth: usize,
    pub queue_capacity: usize,
}

impl TelemetryView {
    /// Add a raw NMEA sentence to history (keep last 5)
    pub fn add_raw_sentence(&mut self, sentence: &str) {
        self.raw_history.push_back(sentence.to_string());
        while self.raw_history.len() > RAW_HISTORY {
            self.raw_history.pop_front();
        }
    }
}

/// Main monitor that wires the receiver to the pipeline and the output
pub struct GpsMonitor {
    config: GpsConfig,
    view: Arc<RwLock<TelemetryView>>,
    running: Arc<AtomicBool>,
}

impl GpsMonitor {
    pub fn new(config: GpsConfig) -> Self {
        Self {
            config,
            view: Arc::new(RwLock::new(TelemetryView::default())),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Run until Ctrl+C or until the source ends. Can only be called once per
    /// process: the line queue and receive slot are bound for its lifetime.
    pub async fn run(&self) -> Result<()> {
        let source = GpsSource::from_config(&self.config)?;
        let (producer, consumer) = LINE_QUEUE
            .try_split()
            .ok_or_else(|| GpsError::Other("Line queue already in use".to_string()))?;
        GPS_RX.bind(producer)?;

        let (reader, writer) = open_source(&source).await?;

        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Interrupted, stopping");
                running.store(false, Ordering::Relaxed);
            }
        });

        let rx_done = Arc::new(AtomicBool::new(false));
        let rx_task = tokio::spawn(receive_task(
            reader,
            Arc::clone(&self.running),
            Arc::clone(&rx_done),
        ));

        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let pipeline = self.build_pipeline(snapshot_tx);
        let status = pipeline.status();

        let poll = poll_loop(
            pipeline,
            consumer,
            writer,
            Arc::clone(&self.view),
            Arc::clone(&self.running),
            rx_done,
            self.config.poll_interval(),
        );

        let output = self.run_output(snapshot_rx, status);
        let (poll_result, output_result) = tokio::join!(poll, output);
        rx_task.abort();

        poll_result?;
        output_result
    }

    fn build_pipeline(&self, snapshots: mpsc::UnboundedSender<GpsData>) -> SentencePipeline {
        let mut pipeline = SentencePipeline::new();
        if !self.config.antenna_commands {
            pipeline = pipeline.without_antenna_commands();
        }

        let view = Arc::clone(&self.view);
        pipeline.set_sentence_callback(move |sentence| {
            if let Ok(mut view) = view.write() {
                view.add_raw_sentence(sentence);
            }
        });

        let view = Arc::clone(&self.view);
        pipeline.set_data_callback(move |data| {
            if let Ok(mut view) = view.write() {
                view.latest = Some(data.clone());
            }
            // Receiver gone only when the output has stopped
            let _ = snapshots.send(data);
        });

        pipeline
    }

    async fn run_output(
        &self,
        mut snapshots: mpsc::UnboundedReceiver<GpsData>,
        status: Arc<FixStatus>,
    ) -> Result<()> {
        match self.config.output {
            OutputMode::Terminal => {
                // The terminal redraws from the shared view; drain the channel
                tokio::spawn(async move { while snapshots.recv().await.is_some() {} });
                TerminalDisplay::with_indicator(self.config.indicator.into())
                    .run(Arc::clone(&self.view), status, Arc::clone(&self.running))
                    .await
            }
            OutputMode::Json => {
                while let Some(data) = snapshots.recv().await {
                    println!("{}", serde_json::to_string(&data)?);
                }
                Ok(())
            }
        }
    }

    /// Stop the monitor
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Check if the monitor is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get a clone of the current view
    pub fn get_view(&self) -> TelemetryView {
        match self.view.read() {
            Ok(view) => view.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

type SourceReader = Box<dyn AsyncRead + Unpin + Send>;
type SourceWriter = Box<dyn AsyncWrite + Unpin + Send>;

async fn open_source(source: &GpsSource) -> Result<(SourceReader, SourceWriter)> {
    match source {
        GpsSource::Serial { port, baudrate } => {
            log::info!("Connecting to GPS on {} at {} baud...", port, baudrate);
            let serial = tokio_serial::new(port, *baudrate)
                .timeout(Duration::from_millis(1000))
                .open_native_async()
                .map_err(|e| {
                    GpsError::Connection(format!("Failed to open serial port {}: {}", port, e))
                })?;
            log::info!("Connected successfully");
            let (reader, writer) = tokio::io::split(serial);
            Ok((Box::new(reader), Box::new(writer)))
        }
        GpsSource::Replay { path, line_delay } => {
            log::info!("Replaying {}", path.display());
            let file = tokio::fs::File::open(path).await.map_err(|e| {
                GpsError::Connection(format!("Failed to open replay file {}: {}", path.display(), e))
            })?;
            let paced = paced_replay(file, *line_delay);
            // Nothing listens for configuration commands during a replay
            Ok((Box::new(paced), Box::new(tokio::io::sink())))
        }
    }
}

/// Re-emit a capture one line at a time, normalising terminators to CRLF.
/// Lines are passed through as raw bytes; garbage is left for the validator.
fn paced_replay(file: tokio::fs::File, line_delay: Duration) -> impl AsyncRead + Unpin + Send {
    let (mut tx, rx) = tokio::io::duplex(4096);
    tokio::spawn(async move {
        let mut lines = BufReader::new(file).split(b'\n');
        loop {
            match lines.next_segment().await {
                Ok(Some(mut line)) => {
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    line.extend_from_slice(b"\r\n");
                    if tx.write_all(&line).await.is_err() {
                        break;
                    }
                    sleep(line_delay).await;
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("Error reading replay file: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Receive context: bytes in, lines out through the bound slot
async fn receive_task(mut reader: SourceReader, running: Arc<AtomicBool>, done: Arc<AtomicBool>) {
    let mut buf = [0u8; 64];
    while running.load(Ordering::Relaxed) {
        match reader.read(&mut buf).await {
            Ok(0) => {
                log::info!("Receiver stream ended");
                break;
            }
            Ok(n) => {
                GPS_RX.on_rx(&buf[..n]);
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => {
                log::error!("Error reading from receiver: {}", e);
                break;
            }
        }
    }
    done.store(true, Ordering::Release);
}

/// Poll loop: one line per iteration, sleep when the queue is empty. Ends
/// once the receiver is gone and the queue has drained, dropping the pipeline
/// and with it the snapshot sender.
async fn poll_loop(
    mut pipeline: SentencePipeline,
    consumer: Consumer<RawLine, QUEUE_DEPTH>,
    mut writer: SourceWriter,
    view: Arc<RwLock<TelemetryView>>,
    running: Arc<AtomicBool>,
    rx_done: Arc<AtomicBool>,
    poll_interval: Duration,
) -> Result<()> {
    let mut last_rx = RxStats::default();
    while running.load(Ordering::Relaxed) {
        let Some(line) = consumer.try_read() else {
            if rx_done.load(Ordering::Acquire) && consumer.is_empty() {
                log::info!(
                    "Receiver finished: {} sentences accepted, {} published",
                    pipeline.stats().accepted,
                    pipeline.stats().published
                );
                break;
            }
            sleep(poll_interval).await;
            continue;
        };

        pipeline.process_line(&line);

        if let Some(commands) = pipeline.take_startup_commands() {
            for command in commands {
                log::info!("Sending {}", command.trim_end());
                writer.write_all(command.as_bytes()).await?;
            }
            writer.flush().await?;
        }

        let rx = GPS_RX.stats();
        if rx.lines_dropped > last_rx.lines_dropped {
            log::warn!(
                "Line queue full, dropped {} line(s)",
                rx.lines_dropped - last_rx.lines_dropped
            );
        }
        if rx.overflows > last_rx.overflows {
            log::warn!(
                "Discarded {} unterminated line(s) longer than the line buffer",
                rx.overflows - last_rx.overflows
            );
        }
        last_rx = rx;

        if let Ok(mut view) = view.write() {
            view.pipeline = pipeline.stats().clone();
            view.rx = rx;
            view.queue_depth = consumer.len();
            view.queue_capacity = consumer.capacity();
        }
    }
    running.store(false, Ordering::Relaxed);
    Ok(())
}

/// List available serial ports
pub fn list_serial_ports() -> Result<()> {
    let ports = tokio_serial::available_ports()?;

    if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        println!("Available serial ports:");
        for port in ports {
            println!("  {} - {:?}", port.port_name, port.port_type);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::{assembler::LineAssembler, nmea::{frame, ANTENNA_COMMANDS}};

    #[test]
    fn test_source_from_config() {
        let mut config = GpsConfig::default();
        assert!(matches!(
            GpsSource::from_config(&config),
            Err(GpsError::Config(_))
        ));

        config.update_serial("/dev/ttyUSB0".to_string(), 9600);
        assert!(matches!(
            GpsSource::from_config(&config),
            Ok(GpsSource::Serial { baudrate: 9600, .. })
        ));

        config.update_replay(PathBuf::from("drive.nmea"));
        assert!(matches!(
            GpsSource::from_config(&config),
            Ok(GpsSource::Replay { .. })
        ));
    }

    #[test]
    fn test_raw_history_keeps_last_five() {
        let mut view = TelemetryView::default();
        for i in 0..8 {
            view.add_raw_sentence(&format!("GPGGA,{}", i));
        }
        assert_eq!(view.raw_history.len(), RAW_HISTORY);
        assert_eq!(view.raw_history.front().map(String::as_str), Some("GPGGA,3"));
        assert_eq!(view.raw_history.back().map(String::as_str), Some("GPGGA,7"));
    }

    #[tokio::test]
    async fn test_paced_replay_normalises_terminators() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.nmea");
        std::fs::write(&path, "$GPGGA,1*00\n$GPRMC,2*00\r\n").unwrap();

        let file = tokio::fs::File::open(&path).await.unwrap();
        let mut replay = paced_replay(file, Duration::ZERO);
        let mut out = Vec::new();
        replay.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"$GPGGA,1*00\r\n$GPRMC,2*00\r\n");
    }

    #[tokio::test]
    async fn test_paced_replay_passes_non_utf8_lines_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noisy.nmea");
        std::fs::write(&path, b"$GPGGA,1*00\r\n\xff\xfe noise\r\n$GPRMC,2*00\n").unwrap();

        let file = tokio::fs::File::open(&path).await.unwrap();
        let mut replay = paced_replay(file, Duration::ZERO);
        let mut out = Vec::new();
        replay.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"$GPGGA,1*00\r\n\xff\xfe noise\r\n$GPRMC,2*00\r\n");
    }

    #[tokio::test]
    async fn test_poll_loop_drains_queue_and_sends_commands_once() {
        let ring: &'static Ringbuf<RawLine, QUEUE_DEPTH> = Box::leak(Box::new(Ringbuf::new()));
        let (producer, consumer) = ring.try_split().unwrap();

        let mut capture = Vec::new();
        for body in [
            "GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,",
            "GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W",
            "GPRMC,123520,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W",
        ] {
            capture.extend_from_slice(frame(body).as_bytes());
        }
        capture.extend_from_slice(b"$GPRMC,garbage*00\r\n");

        let mut assembler = LineAssembler::new();
        for b in capture {
            if let Some(Ok(line)) = assembler.push(b) {
                producer.try_write(line).unwrap();
            }
        }
        assert_eq!(consumer.len(), 4);

        let published = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&published);
        let mut pipeline = SentencePipeline::new();
        pipeline.set_data_callback(move |data| sink.lock().unwrap().push(data));

        let (port, mut port_side) = tokio::io::duplex(1024);
        let view = Arc::new(RwLock::new(TelemetryView::default()));
        let running = Arc::new(AtomicBool::new(true));
        // Receiver already finished: the loop drains what is queued, then stops
        let rx_done = Arc::new(AtomicBool::new(true));

        poll_loop(
            pipeline,
            consumer,
            Box::new(port),
            Arc::clone(&view),
            Arc::clone(&running),
            rx_done,
            Duration::from_millis(1),
        )
        .await
        .unwrap();

        assert!(!running.load(Ordering::Relaxed));
        assert_eq!(published.lock().unwrap().len(), 2);

        let view = view.read().unwrap().clone();
        assert_eq!(view.pipeline.accepted, 3);
        assert_eq!(view.pipeline.rejected_total(), 1);
        assert_eq!(view.queue_depth, 0);
        assert_eq!(view.queue_capacity, QUEUE_DEPTH);

        let mut written = Vec::new();
        port_side.read_to_end(&mut written).await.unwrap();
        assert_eq!(written, ANTENNA_COMMANDS.concat().as_bytes());
    }
}
