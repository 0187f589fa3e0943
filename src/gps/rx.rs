// src/gps/rx.rs
//! Receive-side binding between the peripheral entry point and the line queue
//!
//! A receive slot is allocated statically and bound exactly once to the
//! producer half of the line queue. After binding, the entry point
//! ([`RxSlot::on_rx`]) only needs `&'static RxSlot`, which is what an
//! interrupt handler (or the host receive task) can hold. Nothing else in the
//! pipeline is reachable from here.

use super::assembler::{LineAssembler, RawLine};
use super::queue::Producer;
use crate::error::{GpsError, Result};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, OnceLock,
};

/// Depth of the line queue between the receive context and the poll loop.
pub const QUEUE_DEPTH: usize = 32;

struct RxState<const N: usize> {
    assembler: LineAssembler,
    producer: Producer<RawLine, N>,
}

pub struct RxSlot<const N: usize> {
    state: OnceLock<Mutex<RxState<N>>>,
    lines_queued: AtomicUsize,
    lines_dropped: AtomicUsize,
    overflows: AtomicUsize,
}

/// Receive slot used by the monitor runtime.
///
/// Bound once per process by [`crate::monitor::GpsMonitor::run`].
pub static GPS_RX: RxSlot<QUEUE_DEPTH> = RxSlot::new();

impl<const N: usize> RxSlot<N> {
    pub const fn new() -> Self {
        Self {
            state: OnceLock::new(),
            lines_queued: AtomicUsize::new(0),
            lines_dropped: AtomicUsize::new(0),
            overflows: AtomicUsize::new(0),
        }
    }

    /// Bind the slot to the queue's producer half. Fails if already bound;
    /// the first binding holds for the rest of the process.
    pub fn bind(&self, producer: Producer<RawLine, N>) -> Result<()> {
        let state = Mutex::new(RxState {
            assembler: LineAssembler::new(),
            producer,
        });
        self.state.set(state).map_err(|_| GpsError::AlreadyBound)
    }

    pub fn is_bound(&self) -> bool {
        self.state.get().is_some()
    }

    /// Receive entry point: assemble `bytes` into lines and queue each one.
    ///
    /// Never blocks on the consumer: a full queue drops the line. Returns the
    /// number of lines queued. Bytes received before binding are discarded.
    pub fn on_rx(&self, bytes: &[u8]) -> usize {
        let Some(state) = self.state.get() else {
            return 0;
        };
        // Only the receive context takes this lock, so it is uncontended.
        let mut state = match state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let RxState {
            assembler,
            producer,
        } = &mut *state;

        let mut queued = 0;
        for &b in bytes {
            match assembler.push(b) {
                Some(Ok(line)) => {
                    if producer.try_write(line).is_ok() {
                        queued += 1;
                    } else {
                        self.lines_dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Some(Err(_)) => {
                    self.overflows.fetch_add(1, Ordering::Relaxed);
                }
                None => {}
            }
        }
        self.lines_queued.fetch_add(queued, Ordering::Relaxed);
        queued
    }

    pub fn stats(&self) -> RxStats {
        RxStats {
            lines_queued: self.lines_queued.load(Ordering::Relaxed),
            lines_dropped: self.lines_dropped.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
        }
    }
}

impl<const N: usize> Default for RxSlot<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxStats {
    pub lines_queued: usize,
    pub lines_dropped: usize,
    pub overflows: usize,
}
