// src/gps/assembler.rs
//! Byte-to-line assembly for the receive path
//!
//! Runs wherever receiver bytes arrive (the interrupt context on target
//! hardware, the receive task on a host). Work is bounded by the bytes fed
//! in and never allocates.

use crate::error::AssemblerError;
use tinyvec::ArrayVec;

/// Longest sentence accepted, terminator included.
pub const LINE_CAPACITY: usize = 256;

/// A received line, terminator included, copied by value into the queue.
#[derive(Default, Copy, Clone)]
pub struct RawLine(ArrayVec<[u8; LINE_CAPACITY]>);

impl RawLine {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl core::ops::Deref for RawLine {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.0.as_slice()
    }
}

impl core::fmt::Debug for RawLine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RawLine({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum AssemblerState {
    Collecting,
    // Skipping bytes after an overflow until the next `$`
    Resync,
}

pub struct LineAssembler {
    state: AssemblerState,
    buf: RawLine,
}

impl LineAssembler {
    pub const START_MARKER: u8 = b'$';
    pub const TERMINATOR: u8 = b'\n';

    pub fn new() -> Self {
        Self {
            state: AssemblerState::Collecting,
            buf: RawLine::default(),
        }
    }

    /// Feed one byte. Returns a completed line when `b` is the terminator, or
    /// an overflow error when the buffer filled up without one.
    pub fn push(&mut self, b: u8) -> Option<Result<RawLine, AssemblerError>> {
        match self.state {
            AssemblerState::Resync => {
                if b == Self::START_MARKER {
                    self.state = AssemblerState::Collecting;
                    self.buf.0.clear();
                    self.buf.0.push(b);
                }
                None
            }
            AssemblerState::Collecting => {
                self.buf.0.push(b);
                if b == Self::TERMINATOR {
                    let line = self.buf;
                    self.buf.0.clear();
                    Some(Ok(line))
                } else if self.buf.len() == LINE_CAPACITY {
                    let discarded = self.buf.len();
                    self.buf.0.clear();
                    self.state = AssemblerState::Resync;
                    Some(Err(AssemblerError::BufferOverflow { discarded }))
                } else {
                    None
                }
            }
        }
    }

    /// Bytes currently held for an unfinished line
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn is_resyncing(&self) -> bool {
        self.state == AssemblerState::Resync
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}
