//! Bounded in-memory queue feeding the async flusher thread.
//!
//! Mirrors the reference's fixed-capacity ring of pending events plus a
//! condvar-signaled coalescing wait: producers never block, the flusher
//! wakes on the first enqueue after an idle period and then waits out the
//! coalescing window to batch whatever else arrives, grounded on
//! `journal_queue.c::journal_flusher_thread`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::format::Payload;

/// A bounded FIFO of pending payloads shared between producer threads and
/// the single flusher thread.
pub struct BoundedQueue {
    capacity: usize,
    inner: Mutex<Inner>,
    not_empty: Condvar,
    dropped_events: AtomicU64,
}

struct Inner {
    items: VecDeque<Payload>,
    shutdown: bool,
}

impl BoundedQueue {
    /// Creates an empty queue with room for `capacity` pending payloads.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity.min(256)),
                shutdown: false,
            }),
            not_empty: Condvar::new(),
            dropped_events: AtomicU64::new(0),
        }
    }

    /// Attempts to enqueue `payload`. Never blocks: if the queue is at
    /// capacity the payload is dropped and the drop counter is incremented.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueFull`] if the queue was already at capacity;
    /// the payload is dropped and `dropped_events` is incremented.
    pub fn try_enqueue(&self, payload: Payload) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.items.len() >= self.capacity {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            return Err(Error::QueueFull);
        }
        inner.items.push_back(payload);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Blocks until at least one item is queued or the queue is shut down,
    /// then waits out `coalescing_window` to absorb additional arrivals
    /// before draining everything currently queued.
    ///
    /// Returns an empty vector only when the queue has been shut down and
    /// drained.
    pub fn wait_and_drain(&self, coalescing_window: Duration) -> Vec<Payload> {
        self.wait_and_drain_when_ready(coalescing_window, || true)
    }

    /// Like [`Self::wait_and_drain`], but first waits (polling every 100ms)
    /// until `is_ready` reports the backing device usable, and re-checks it
    /// after the coalescing window: if the device went not-ready while this
    /// call was coalescing, the batch is left queued and the wait for
    /// readiness restarts instead of draining to a writer that would fail.
    /// Shutdown always short-circuits both waits so a final drain is
    /// attempted regardless of device state.
    pub fn wait_and_drain_when_ready(&self, coalescing_window: Duration, is_ready: impl Fn() -> bool) -> Vec<Payload> {
        const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
        loop {
            let mut inner = self.inner.lock();
            while !inner.shutdown && !is_ready() {
                self.not_empty.wait_for(&mut inner, READY_POLL_INTERVAL);
            }
            while inner.items.is_empty() && !inner.shutdown {
                self.not_empty.wait(&mut inner);
            }
            if inner.items.is_empty() {
                return Vec::new();
            }
            if !coalescing_window.is_zero() {
                // Give concurrent producers a short window to join this batch
                // rather than flushing one event at a time under load.
                self.not_empty.wait_for(&mut inner, coalescing_window);
            }
            if !inner.shutdown && !is_ready() {
                // Device dropped out from under us; leave the batch queued
                // and go back to waiting for readiness instead of draining.
                continue;
            }
            return inner.items.drain(..).collect();
        }
    }

    /// Drains whatever is currently queued without waiting.
    pub fn drain_now(&self) -> Vec<Payload> {
        let mut inner = self.inner.lock();
        inner.items.drain(..).collect()
    }

    /// Marks the queue as shut down and wakes the flusher so it can observe
    /// the flag and exit after a final drain.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.shutdown = true;
        drop(inner);
        self.not_empty.notify_all();
    }

    /// Whether [`Self::shutdown`] has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.lock().shutdown
    }

    /// Total number of payloads dropped because the queue was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Records `n` additional payloads as dropped for reasons other than
    /// queue overflow (e.g. the remainder of a batch abandoned after an I/O
    /// failure partway through a write).
    pub fn record_dropped(&self, n: u64) {
        self.dropped_events.fetch_add(n, Ordering::Relaxed);
    }

    /// Current number of queued, not-yet-flushed payloads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether the queue currently holds no payloads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod queue_tests;
