//! Thread-safe FIFO of text lines shared by a producer and a consumer loop.
//!
//! # How waiting works
//!
//! The queue is guarded by a `Mutex`; a separate `Condvar` is the "data
//! arrived" signal.  [`Mailbox::enqueue`] pushes under the lock and wakes one
//! waiter.  [`Mailbox::wait_for_data`] parks the caller until the queue is
//! non-empty, the mailbox is closed, or the timeout elapses, whichever comes
//! first.  The waiting loop always re-checks the queue after waking, so
//! spurious wake-ups are harmless.
//!
//! [`Mailbox::drain_all`] takes the whole queue in one step while holding the
//! lock: entries come out in the order their `enqueue` calls returned, and
//! none can be lost or duplicated between the snapshot and the clear.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::trace;

#[derive(Debug, Default)]
struct Inner {
    items: VecDeque<String>,
    closed: bool,
}

/// A FIFO mailbox of text lines.
#[derive(Debug)]
pub struct Mailbox {
    /// Short label used in log output (`"outbound"`, `"inbound"`).
    label: &'static str,
    inner: Mutex<Inner>,
    available: Condvar,
}

impl Mailbox {
    /// Creates an empty, open mailbox.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            inner: Mutex::new(Inner::default()),
            available: Condvar::new(),
        }
    }

    /// Appends `item` to the tail and wakes one blocked waiter.
    ///
    /// Entries are accepted even after [`close`](Self::close) so nothing a
    /// producer hands over is dropped silently.
    pub fn enqueue(&self, item: impl Into<String>) {
        let mut inner = self.lock();
        inner.items.push_back(item.into());
        trace!(mailbox = self.label, pending = inner.items.len(), "enqueued");
        drop(inner);
        self.available.notify_one();
    }

    /// Removes and returns every pending entry in enqueue order.
    ///
    /// Never blocks; returns an empty vector when nothing is pending.
    pub fn drain_all(&self) -> Vec<String> {
        let mut inner = self.lock();
        inner.items.drain(..).collect()
    }

    /// Point-in-time emptiness check.
    ///
    /// Another thread may enqueue right after this returns; use
    /// [`drain_all`](Self::drain_all) to actually consume entries.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Blocks until an entry is pending, the mailbox is closed, or `timeout`
    /// elapses.
    ///
    /// Returns `true` if entries are pending when the wait ends.
    pub fn wait_for_data(&self, timeout: Duration) -> bool {
        let inner = self.lock();
        let (inner, _timed_out) = self
            .available
            .wait_timeout_while(inner, timeout, |inner| {
                inner.items.is_empty() && !inner.closed
            })
            .unwrap_or_else(PoisonError::into_inner);
        !inner.items.is_empty()
    }

    /// Releases every blocked waiter; later waits return without blocking.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    // The queue is always left consistent, so a panic in another holder of
    // the lock does not invalidate it.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
