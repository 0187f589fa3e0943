// src/error.rs
//! Error types for the telemetry pipeline and its host runtime

use std::fmt;

pub type Result<T> = std::result::Result<T, GpsError>;

/// Runtime errors: opening the receiver, configuration storage, wiring.
#[derive(Debug)]
pub enum GpsError {
    Io(std::io::Error),
    Serial(tokio_serial::Error),
    Json(serde_json::Error),
    Connection(String),
    Config(String),
    AlreadyBound,
    Other(String),
}

impl fmt::Display for GpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpsError::Io(e) => write!(f, "IO error: {}", e),
            GpsError::Serial(e) => write!(f, "Serial error: {}", e),
            GpsError::Json(e) => write!(f, "JSON error: {}", e),
            GpsError::Connection(msg) => write!(f, "Connection error: {}", msg),
            GpsError::Config(msg) => write!(f, "Configuration error: {}", msg),
            GpsError::AlreadyBound => write!(f, "Receive slot is already bound to a pipeline"),
            GpsError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for GpsError {}

impl From<std::io::Error> for GpsError {
    fn from(error: std::io::Error) -> Self {
        GpsError::Io(error)
    }
}

impl From<tokio_serial::Error> for GpsError {
    fn from(error: tokio_serial::Error) -> Self {
        GpsError::Serial(error)
    }
}

impl From<serde_json::Error> for GpsError {
    fn from(error: serde_json::Error) -> Self {
        GpsError::Json(error)
    }
}

/// Reasons a received line is rejected before it reaches the aggregator.
///
/// None of these are fatal: the sentence is dropped and the pipeline moves
/// on to the next line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceError {
    MissingStartMarker,
    BadTermination,
    ChecksumMismatch { specified: [u8; 2], calculated: u8 },
}

impl SentenceError {
    /// Short stable name, used for per-kind rejection counters.
    pub fn kind(&self) -> &'static str {
        match self {
            SentenceError::MissingStartMarker => "missing-start-marker",
            SentenceError::BadTermination => "bad-termination",
            SentenceError::ChecksumMismatch { .. } => "checksum-mismatch",
        }
    }
}

impl fmt::Display for SentenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentenceError::MissingStartMarker => write!(f, "Sentence does not start with $"),
            SentenceError::BadTermination => write!(f, "Sentence does not end with *XX\\r\\n"),
            SentenceError::ChecksumMismatch {
                specified,
                calculated,
            } => write!(
                f,
                "Failed to validate checksum. Specified: {}, Expected: {:02X}",
                String::from_utf8_lossy(specified),
                calculated
            ),
        }
    }
}

impl std::error::Error for SentenceError {}

/// Line assembly failures on the receive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerError {
    /// The scratch buffer filled before a terminator arrived; `discarded`
    /// bytes were thrown away and the assembler is resynchronising on `$`.
    BufferOverflow { discarded: usize },
}

impl fmt::Display for AssemblerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblerError::BufferOverflow { discarded } => {
                write!(f, "Line buffer overflow, discarded {} bytes", discarded)
            }
        }
    }
}

impl std::error::Error for AssemblerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_message() {
        let err = SentenceError::ChecksumMismatch {
            specified: *b"6A",
            calculated: 0x4B,
        };
        assert_eq!(
            err.to_string(),
            "Failed to validate checksum. Specified: 6A, Expected: 4B"
        );
        assert_eq!(err.kind(), "checksum-mismatch");
    }

    #[test]
    fn test_io_conversion() {
        let err: GpsError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, GpsError::Io(_)));
    }

    #[test]
    fn test_serial_conversion() {
        let err: GpsError =
            tokio_serial::Error::new(tokio_serial::ErrorKind::NoDevice, "no such port").into();
        assert!(matches!(err, GpsError::Serial(_)));
        assert_eq!(err.to_string(), "Serial error: no such port");
    }
}
