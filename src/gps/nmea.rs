// src/gps/nmea.rs
//! NMEA sentence framing, checksum validation and field splitting

use crate::error::SentenceError;

/// Sentence types the pipeline decodes, matched exactly on the first field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceKind {
    /// Satellites in view, multi-part
    Gsv,
    /// Recommended minimum: time, position, speed
    Rmc,
    /// Fix data: satellites in use, altitude
    Gga,
    /// Dilution of precision: used satellites, fix mode
    Gsa,
    /// PA6H antenna status
    Pgtop,
    /// PA1616S antenna status
    Pcd,
    Other,
}

impl SentenceKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "GPGSV" => SentenceKind::Gsv,
            "GPRMC" => SentenceKind::Rmc,
            "GPGGA" => SentenceKind::Gga,
            "GPGSA" => SentenceKind::Gsa,
            "PGTOP" => SentenceKind::Pgtop,
            "PCD" => SentenceKind::Pcd,
            _ => SentenceKind::Other,
        }
    }
}

/// Configuration commands enabling antenna-source reporting, one per
/// receiver variant (PA6H, PA1616S).
pub const ANTENNA_COMMANDS: [&str; 2] = ["$PGCMD,33,1*6C\r\n", "$CDCMD,33,1*7C\r\n"];

/// A sentence whose framing and checksum have been verified. Holds the body
/// between `$` and `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSentence {
    body: String,
}

impl ValidatedSentence {
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Comma-separated fields; empty strings mark absent values.
    pub fn fields(&self) -> Vec<&str> {
        split_fields(&self.body)
    }

    pub fn tag(&self) -> &str {
        self.body.split(',').next().unwrap_or_default()
    }

    pub fn kind(&self) -> SentenceKind {
        SentenceKind::from_tag(self.tag())
    }
}

/// XOR of every byte in `body`
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Render a checksum the way it appears on the wire: two uppercase hex digits
pub fn checksum_hex(check: u8) -> [u8; 2] {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    [HEX[(check >> 4) as usize], HEX[(check & 0x0f) as usize]]
}

/// Wrap a body into a complete wire sentence
pub fn frame(body: &str) -> String {
    let hex = checksum_hex(checksum(body.as_bytes()));
    format!("${}*{}{}\r\n", body, hex[0] as char, hex[1] as char)
}

/// Validate format, verify the checksum, and strip `$`, `*XX` and CRLF.
pub fn validate(line: &[u8]) -> Result<ValidatedSentence, SentenceError> {
    let len = line.len();
    if len < 1 || line[0] != b'$' {
        return Err(SentenceError::MissingStartMarker);
    }
    if len < 6 || &line[len - 2..] != b"\r\n" || line[len - 5] != b'*' {
        return Err(SentenceError::BadTermination);
    }

    let body = &line[1..len - 5];
    let specified = [line[len - 4], line[len - 3]];
    let calculated = checksum(body);
    if checksum_hex(calculated) != specified {
        return Err(SentenceError::ChecksumMismatch {
            specified,
            calculated,
        });
    }

    // Checksum matched, so the body is what the receiver sent; NMEA is ASCII
    Ok(ValidatedSentence {
        body: String::from_utf8_lossy(body).into_owned(),
    })
}

/// Split a sentence body on commas, keeping empty fields.
pub fn split_fields(body: &str) -> Vec<&str> {
    body.split(',').collect()
}

/// Field `i` when present and non-empty
pub fn field<'a>(fields: &[&'a str], i: usize) -> Option<&'a str> {
    fields.get(i).copied().filter(|f| !f.is_empty())
}
