use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use super::{Cell, Mode, Ring, DEFAULT_GRANULARITY};
use crate::registry::Metric;

/// Sum and sample count of a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub sum: i64,
    pub count: i64,
}

impl Tally {
    /// Truncating mean, `0` when there are no samples.
    pub fn mean(self) -> i64 {
        if self.count <= 0 {
            return 0;
        }
        self.sum.checked_div(self.count).unwrap_or(0)
    }
}

/// Sum and count are independent atomics. A reader racing a producer or a
/// rotation can see one updated before the other; the skew lasts one op.
#[derive(Debug, Default)]
pub(crate) struct TallyCell {
    sum: AtomicI64,
    count: AtomicI64,
}

impl Cell for TallyCell {
    type Sample = i64;
    type Value = Tally;

    #[inline]
    fn record(&self, v: i64) {
        self.sum.fetch_add(v, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn load(&self) -> Tally {
        Tally {
            sum: self.sum.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
        }
    }

    fn take(&self) -> Tally {
        Tally {
            sum: self.sum.swap(0, Ordering::AcqRel),
            count: self.count.swap(0, Ordering::AcqRel),
        }
    }

    fn absorb(&self, delta: Tally) {
        self.sum.fetch_add(delta.sum, Ordering::Relaxed);
        self.count.fetch_add(delta.count, Ordering::Relaxed);
    }

    fn combine(a: Tally, b: Tally) -> Tally {
        Tally {
            sum: a.sum.wrapping_add(b.sum),
            count: a.count.wrapping_add(b.count),
        }
    }

    fn delta(a: Tally, b: Tally) -> Tally {
        Tally {
            sum: a.sum.wrapping_sub(b.sum),
            count: a.count.wrapping_sub(b.count),
        }
    }
}

/// Thread-safe moving average over a trailing time window.
///
/// Memory is two `i64` per bucket.
pub struct WindowedAverage {
    ring: Ring<TallyCell>,
}

impl WindowedAverage {
    /// Average over `interval`, split into `granularity` buckets.
    ///
    /// Degenerate parameters yield an all-time average.
    pub fn new(interval: Duration, granularity: usize) -> Self {
        Self {
            ring: Ring::new(interval, granularity),
        }
    }

    /// Average over `interval` with [`DEFAULT_GRANULARITY`].
    pub fn windowed(interval: Duration) -> Self {
        Self::new(interval, DEFAULT_GRANULARITY)
    }

    /// Average that never rolls over.
    pub fn cumulative() -> Self {
        Self::new(Duration::ZERO, 1)
    }

    /// Record one sample.
    #[inline]
    pub fn add(&self, value: i64) {
        self.ring.record(value);
    }

    /// Truncating mean of the samples in the window, `0` if there are none.
    pub fn average(&self) -> i64 {
        self.tally().mean()
    }

    /// Raw sum and count of the window.
    pub fn tally(&self) -> Tally {
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

impl fmt::Display for WindowedAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.average())
    }
}

impl Metric for WindowedAverage {
    fn value(&self) -> i64 {
        self.average()
    }

    fn close(&self) {
        WindowedAverage::close(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_guards_empty_and_overflow() {
        assert_eq!(Tally::default().mean(), 0);
        assert_eq!(Tally { sum: 7, count: 0 }.mean(), 0);
        assert_eq!(Tally { sum: i64::MIN, count: -1 }.mean(), 0);
        assert_eq!(Tally { sum: 7, count: 2 }.mean(), 3);
        assert_eq!(Tally { sum: -7, count: 2 }.mean(), -3);
    }
}
