//! Power-of-two bucketed histogram.
//!
//! Bucket `0` counts samples equal to zero, bucket `i` (for `i >= 1`) counts
//! samples in `[2^(i-1), 2^i)`. The last bucket absorbs everything above.

use core::sync::atomic::{AtomicU64, Ordering};

/// Number of buckets. Covers every `u64` sample.
pub const BUCKETS: usize = 65;

/// A lock-free histogram of `u64` samples.
#[derive(Debug)]
pub struct Histogram {
    buckets: [AtomicU64; BUCKETS],
    sum: AtomicU64,
    max: AtomicU64,
}

/// Point-in-time copy of a [`Histogram`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistogramSnapshot {
    /// Per-bucket sample counts.
    pub buckets: [u64; BUCKETS],
    /// Saturating sum of all samples.
    pub sum: u64,
    /// Largest sample seen.
    pub max: u64,
}

fn bucket_of(sample: u64) -> usize {
    (u64::BITS - sample.leading_zeros()) as usize
}

impl Histogram {
    /// Create an empty histogram.
    pub const fn new() -> Self {
        Self {
            buckets: [const { AtomicU64::new(0) }; BUCKETS],
            sum: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Record a single sample.
    pub fn record(&self, sample: u64) {
        self.buckets[bucket_of(sample)].fetch_add(1, Ordering::Relaxed);
        // fetch_add wraps; keep the sum saturating instead.
        let _ = self
            .sum
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| {
                Some(s.saturating_add(sample))
            });
        self.max.fetch_max(sample, Ordering::Relaxed);
    }

    /// Copy the current state.
    pub fn snapshot(&self) -> HistogramSnapshot {
        let mut buckets = [0u64; BUCKETS];
        for (out, b) in buckets.iter_mut().zip(self.buckets.iter()) {
            *out = b.load(Ordering::Relaxed);
        }
        HistogramSnapshot {
            buckets,
            sum: self.sum.load(Ordering::Relaxed),
            max: self.max.load(Ordering::Relaxed),
        }
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl HistogramSnapshot {
    /// Total number of samples.
    pub fn count(&self) -> u64 {
        self.buckets.iter().sum()
    }

    /// Mean sample, or `0.0` when empty.
    pub fn mean(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.sum as f64 / n as f64,
        }
    }
}
