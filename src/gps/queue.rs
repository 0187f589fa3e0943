// src/gps/queue.rs
//! Single-producer single-consumer ring for handing completed lines from the
//! receive context to the poll loop.
//!
//! The producer side never blocks and never allocates: a full ring hands the
//! value back. The consumer polls with [`Consumer::try_read`].

use std::{
    cell::UnsafeCell,
    mem::MaybeUninit,
    sync::atomic::{
        AtomicBool, AtomicUsize,
        Ordering::{Acquire, Relaxed, Release},
    },
};

// Push at HEAD, pop at TAIL
pub struct Ringbuf<T, const N: usize> {
    is_split: AtomicBool,
    head: AtomicUsize,
    tail: AtomicUsize,
    buf: [UnsafeCell<MaybeUninit<T>>; N],
}

// SAFETY: A slot is only ever touched by the single Producer (before head is
// published) or the single Consumer (before tail is published), never both.
unsafe impl<T: Send, const N: usize> Sync for Ringbuf<T, N> {}

impl<T, const N: usize> Default for Ringbuf<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Ringbuf<T, N> {
    pub const fn new() -> Self {
        Self {
            is_split: AtomicBool::new(false),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            buf: [const { UnsafeCell::new(MaybeUninit::uninit()) }; N],
        }
    }

    /// Hand out the two halves. Returns `None` on every call after the first,
    /// so at most one Producer and one Consumer ever exist.
    pub fn try_split(&'static self) -> Option<(Producer<T, N>, Consumer<T, N>)> {
        if self.is_split.fetch_or(true, Relaxed) {
            None
        } else {
            Some((Producer(self), Consumer(self)))
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    fn len(&self) -> usize {
        let head = self.head.load(Acquire);
        let tail = self.tail.load(Acquire);
        head.wrapping_sub(tail)
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, const N: usize> Drop for Ringbuf<T, N> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let mut tail = *self.tail.get_mut();
        while tail != head {
            // SAFETY: every slot between tail and head holds an initialised value
            unsafe { self.buf[tail % N].get_mut().assume_init_drop() };
            tail = tail.wrapping_add(1);
        }
    }
}

pub struct Consumer<T: 'static, const N: usize>(&'static Ringbuf<T, N>);

impl<T: 'static, const N: usize> Consumer<T, N> {
    pub fn try_read(&self) -> Option<T> {
        let tail = self.0.tail.load(Relaxed);
        if self.0.head.load(Acquire) == tail {
            return None;
        }
        // SAFETY: The buffer is not empty, and could not have become empty since
        // we checked it because only one Consumer may exist. The Acquire load of
        // head makes the Producer's write to this slot visible.
        let val = unsafe { self.0.buf[tail % N].get().read().assume_init() };
        self.0.tail.store(tail.wrapping_add(1), Release);
        Some(val)
    }

    /// Lines waiting to be processed
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn capacity(&self) -> usize {
        self.0.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub struct Producer<T: 'static, const N: usize>(&'static Ringbuf<T, N>);

impl<T: 'static, const N: usize> Producer<T, N> {
    pub fn try_write(&self, val: T) -> Result<(), T> {
        let head = self.0.head.load(Relaxed);
        if head.wrapping_sub(self.0.tail.load(Acquire)) == N {
            return Err(val);
        }
        // SAFETY: The buffer is not full, and could not have become full since
        // we checked it because only one Producer may exist. The Acquire load of
        // tail guarantees the Consumer has finished reading this slot.
        unsafe {
            (*self.0.buf[head % N].get()).write(val);
        }
        self.0.head.store(head.wrapping_add(1), Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leak<T, const N: usize>() -> &'static Ringbuf<T, N> {
        Box::leak(Box::new(Ringbuf::new()))
    }

    #[test]
    fn test_split_only_once() {
        let rb = leak::<u32, 4>();
        assert!(rb.try_split().is_some());
        assert!(rb.try_split().is_none());
    }

    #[test]
    fn test_fifo_order_and_full_rejection() {
        let (tx, rx) = leak::<u32, 3>().try_split().unwrap();

        assert!(rx.try_read().is_none());
        for i in 0..3 {
            assert!(tx.try_write(i).is_ok());
        }
        assert_eq!(rx.len(), rx.capacity());
        assert_eq!(tx.try_write(99), Err(99));

        assert_eq!(rx.try_read(), Some(0));
        assert!(tx.try_write(3).is_ok());
        assert_eq!(rx.try_read(), Some(1));
        assert_eq!(rx.try_read(), Some(2));
        assert_eq!(rx.try_read(), Some(3));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_cross_thread_delivery_preserves_order() {
        let (tx, rx) = leak::<usize, 8>().try_split().unwrap();

        let producer = std::thread::spawn(move || {
            for i in 0..1000 {
                let mut v = i;
                while let Err(back) = tx.try_write(v) {
                    v = back;
                    std::thread::yield_now();
                }
            }
        });

        let mut expected = 0;
        while expected < 1000 {
            match rx.try_read() {
                Some(v) => {
                    assert_eq!(v, expected);
                    expected += 1;
                }
                None => std::thread::yield_now(),
            }
        }
        producer.join().unwrap();
    }
}
