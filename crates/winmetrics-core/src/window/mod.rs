//! Time-windowed accumulators.
//!
//! A window of `interval` is split into `granularity` buckets. Producers add
//! into the active bucket with a single atomic op. A per-instance driver
//! advances the active index every `interval / granularity` and folds the
//! bucket it leaves behind into a running carry. Reads are
//! `active bucket + carry`, so their cost does not depend on event volume.
//!
//! The driver is a tokio task when a runtime is current at construction,
//! and a dedicated parked thread otherwise.
//!
//! The window edge is approximate to one bucket duration. A write racing a
//! rotation may land in the bucket just vacated; it is folded into the carry
//! on the next tick.
//!
//! `granularity <= 1` or a zero interval selects cumulative mode: one bucket,
//! no driver, a plain all-time total.

mod average;
mod counter;

pub use average::{Tally, WindowedAverage};
pub use counter::WindowedCounter;

use std::sync::atomic::{fence, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::Thread;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

/// Default number of buckets per window. A one minute window with the
/// default granularity is accurate to within ~2 seconds; pollers should
/// scrape less often than `interval / granularity`.
pub const DEFAULT_GRANULARITY: usize = 32;

const ROTATE_THREAD: &str = "winmetrics-rotate";

/// Operating mode, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Single bucket, never rotates, never resets.
    Cumulative,
    /// `granularity` buckets spanning `interval`, rotated in the background.
    Windowed { interval: Duration, granularity: usize },
}

/// One bucket slot. Each field is its own atomic; a multi-field cell is only
/// consistent per field.
pub(crate) trait Cell: Default + Send + Sync + 'static {
    type Sample: Copy;
    type Value: Copy + Default + PartialEq + Send + Sync + 'static;

    fn record(&self, sample: Self::Sample);
    fn load(&self) -> Self::Value;
    /// Swap the cell back to empty, returning what it held.
    fn take(&self) -> Self::Value;
    fn absorb(&self, delta: Self::Value);

    /// `a + b`, wrapping.
    fn combine(a: Self::Value, b: Self::Value) -> Self::Value;
    /// `a - b`, wrapping.
    fn delta(a: Self::Value, b: Self::Value) -> Self::Value;
}

struct Shared<C: Cell> {
    buckets: Box<[C]>,
    active: AtomicUsize,
    carry: C,
    /// Odd while a rotation is in progress.
    epoch: AtomicU64,
}

impl<C: Cell> Shared<C> {
    fn with_buckets(n: usize) -> Self {
        Self {
            buckets: (0..n.max(1)).map(|_| C::default()).collect(),
            active: AtomicUsize::new(0),
            carry: C::default(),
            epoch: AtomicU64::new(0),
        }
    }

    fn record(&self, sample: C::Sample) {
        let i = self.active.load(Ordering::Acquire);
        self.buckets[i].record(sample);
    }

    /// `active + carry`, retried until no rotation overlapped the loads.
    fn read(&self) -> C::Value {
        let mut spins = 0u32;
        loop {
            let before = self.epoch.load(Ordering::Acquire);
            if before & 1 == 0 {
                let i = self.active.load(Ordering::Acquire);
                let value = C::combine(self.buckets[i].load(), self.carry.load());
                fence(Ordering::Acquire);
                if self.epoch.load(Ordering::Relaxed) == before {
                    return value;
                }
            }
            spins += 1;
            if spins < 64 {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }

    /// Advance the active bucket by one slot.
    ///
    /// `folded[i]` is what bucket `i` has contributed to the carry since it
    /// was vacated. Before switching, every inactive bucket is settled: writes
    /// that reached it after it was vacated (a producer that read the old
    /// index just before a switch) are added to both the carry and
    /// `folded[i]`. Evicting a bucket then removes exactly `folded[i]`, and
    /// anything that lands between the settle and the eviction moves into the
    /// new active bucket.
    ///
    /// Only the driver calls this, so `folded` needs no sharing.
    fn rotate(&self, folded: &mut [C::Value]) {
        let epoch = self.epoch.load(Ordering::Relaxed);
        self.epoch.store(epoch.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        let len = self.buckets.len();
        let vacated = self.active.load(Ordering::Relaxed);
        self.settle(vacated, folded);

        let next = (vacated + 1) % len;
        self.active.store(next, Ordering::Release);

        let kept = self.buckets[vacated].load();
        let cleared = self.buckets[next].take();
        let evicted = std::mem::take(&mut folded[next]);
        folded[vacated] = kept;

        self.carry.absorb(C::delta(kept, evicted));

        let straggler = C::delta(cleared, evicted);
        if straggler != C::Value::default() {
            self.buckets[next].absorb(straggler);
        }

        self.epoch.store(epoch.wrapping_add(2), Ordering::Release);
    }

    /// Fold late writes in every bucket but `active` into the carry.
    fn settle(&self, active: usize, folded: &mut [C::Value]) {
        for (i, (bucket, folded)) in self.buckets.iter().zip(folded.iter_mut()).enumerate() {
            if i == active {
                continue;
            }
            let residual = C::delta(bucket.load(), *folded);
            if residual != C::Value::default() {
                self.carry.absorb(residual);
                *folded = C::combine(*folded, residual);
            }
        }
    }
}

/// Driver-side state: the shared ring plus the per-bucket fold ledger.
struct Rotation<C: Cell> {
    shared: Arc<Shared<C>>,
    folded: Vec<C::Value>,
}

impl<C: Cell> Rotation<C> {
    fn new(shared: Arc<Shared<C>>) -> Self {
        let folded = vec![C::Value::default(); shared.buckets.len()];
        Self { shared, folded }
    }

    fn tick(&mut self) {
        self.shared.rotate(&mut self.folded);
    }
}

struct Stop {
    token: CancellationToken,
    /// Set when the driver is a thread; woken so it sees the cancellation.
    thread: Option<Thread>,
}

/// The shared ring engine behind [`WindowedCounter`] and [`WindowedAverage`].
pub(crate) struct Ring<C: Cell> {
    shared: Arc<Shared<C>>,
    mode: Mode,
    stop: Option<Stop>,
}

impl<C: Cell> Ring<C> {
    pub(crate) fn new(interval: Duration, granularity: usize) -> Self {
        let Some(period) = Self::bucket_duration(interval, granularity) else {
            return Self::cumulative();
        };

        let shared = Arc::new(Shared::with_buckets(granularity));
        let token = CancellationToken::new();
        let rotation = Rotation::new(Arc::clone(&shared));

        let thread = match Handle::try_current() {
            Ok(handle) => {
                spawn_task(&handle, rotation, period, token.clone());
                None
            }
            Err(_) => match spawn_thread(rotation, period, token.clone()) {
                Ok(thread) => Some(thread),
                Err(e) => {
                    tracing::warn!(
                        ?interval,
                        granularity,
                        error = %e,
                        "rotation thread failed to start; window falls back to cumulative mode"
                    );
                    return Self::cumulative();
                }
            },
        };

        Self {
            shared,
            mode: Mode::Windowed {
                interval,
                granularity,
            },
            stop: Some(Stop { token, thread }),
        }
    }

    fn bucket_duration(interval: Duration, granularity: usize) -> Option<Duration> {
        if interval.is_zero() || granularity <= 1 {
            return None;
        }
        let n = u32::try_from(granularity).ok()?;
        let period = interval / n;
        (!period.is_zero()).then_some(period)
    }

    fn cumulative() -> Self {
        Self {
            shared: Arc::new(Shared::with_buckets(1)),
            mode: Mode::Cumulative,
            stop: None,
        }
    }

    #[inline]
    pub(crate) fn record(&self, sample: C::Sample) {
        self.shared.record(sample);
    }

    #[inline]
    pub(crate) fn read(&self) -> C::Value {
        self.shared.read()
    }

    pub(crate) fn mode(&self) -> Mode {
        self.mode
    }

    /// Stop the driver. The last window's contents stay readable but no
    /// longer decay. Idempotent; a no-op in cumulative mode.
    pub(crate) fn close(&self) {
        if let Some(stop) = &self.stop {
            stop.token.cancel();
            if let Some(thread) = &stop.thread {
                thread.unpark();
            }
        }
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.stop
            .as_ref()
            .map_or(true, |stop| stop.token.is_cancelled())
    }
}

impl<C: Cell> Drop for Ring<C> {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_task<C: Cell>(
    handle: &Handle,
    mut rotation: Rotation<C>,
    period: Duration,
    stop: CancellationToken,
) {
    handle.spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        tracing::debug!(?period, "rotation task started");
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => rotation.tick(),
            }
        }
        tracing::debug!(?period, "rotation task stopped");
    });
}

/// Drive `rotation` from a named OS thread, for windows built outside any
/// tokio runtime. The thread parks between ticks; `Ring::close` unparks it.
fn spawn_thread<C: Cell>(
    mut rotation: Rotation<C>,
    period: Duration,
    stop: CancellationToken,
) -> std::io::Result<Thread> {
    let handle = std::thread::Builder::new()
        .name(ROTATE_THREAD.into())
        .spawn(move || {
            tracing::debug!(?period, "rotation thread started");
            let mut deadline = std::time::Instant::now() + period;
            while !stop.is_cancelled() {
                let now = std::time::Instant::now();
                if now >= deadline {
                    rotation.tick();
                    deadline += period;
                } else {
                    std::thread::park_timeout(deadline - now);
                }
            }
            tracing::debug!(?period, "rotation thread stopped");
        })?;
    Ok(handle.thread().clone())
}
