use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use super::{Cell, Mode, Ring, DEFAULT_GRANULARITY};
use crate::registry::Metric;

#[derive(Debug, Default)]
pub(crate) struct SumCell(AtomicI64);

impl Cell for SumCell {
    type Sample = i64;
    type Value = i64;

    #[inline]
    fn record(&self, n: i64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    fn load(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }

    fn take(&self) -> i64 {
        self.0.swap(0, Ordering::AcqRel)
    }

    fn absorb(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    fn combine(a: i64, b: i64) -> i64 {
        a.wrapping_add(b)
    }

    fn delta(a: i64, b: i64) -> i64 {
        a.wrapping_sub(b)
    }
}

/// Thread-safe event counter over a trailing time window.
///
/// Memory is one `i64` per bucket. In cumulative mode it is an ordinary
/// counter with a tiny bit of overhead.
pub struct WindowedCounter {
    ring: Ring<SumCell>,
}

impl WindowedCounter {
    /// Counter over `interval`, split into `granularity` buckets.
    ///
    /// A zero interval or `granularity <= 1` yields a cumulative counter.
    /// Outside a tokio runtime the window rotates on its own thread.
    pub fn new(interval: Duration, granularity: usize) -> Self {
        Self {
            ring: Ring::new(interval, granularity),
        }
    }

    /// Counter over `interval` with [`DEFAULT_GRANULARITY`].
    pub fn windowed(interval: Duration) -> Self {
        Self::new(interval, DEFAULT_GRANULARITY)
    }

    /// Counter that never rolls over.
    pub fn cumulative() -> Self {
        Self::new(Duration::ZERO, 1)
    }

    /// Record `n` events now.
    #[inline]
    pub fn add(&self, n: i64) {
        self.ring.record(n);
    }

    /// Approximate number of events in the trailing window.
    pub fn rate(&self) -> i64 {
        self.ring.read()
    }

    pub fn mode(&self) -> Mode {
        self.ring.mode()
    }

    /// Stop the rotation task. See [`Metric::close`].
    pub fn close(&self) {
        self.ring.close();
    }
}

impl fmt::Display for WindowedCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rate())
    }
}

impl Metric for WindowedCounter {
    fn value(&self) -> i64 {
        self.rate()
    }

    fn close(&self) {
        WindowedCounter::close(self);
    }
}
