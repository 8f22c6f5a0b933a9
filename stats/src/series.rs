// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::ResetBlock;

use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering;

/// A running series over `u64` samples: count, sum, min, max, last value,
/// and online mean/variance via Welford's algorithm.
///
/// `add_point` is lock-free and intended for a single hot writer; concurrent
/// writers do not corrupt memory but may interleave the mean/variance
/// updates. Readers take a [`snapshot`](Self::snapshot) at any time and get
/// an eventually-consistent view.
pub struct SeriesU64 {
    sum: AtomicU64,
    count: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
    last: AtomicU64,
    mean: AtomicU64,
    // running sum of delta * delta2; divide by (count - 1) for the
    // estimated variance
    variance: AtomicU64,
    reset: ResetBlock,
}

/// A masked point-in-time view of a [`SeriesU64`].
///
/// While a reset is pending every field reads zero. `avg` is the integer
/// `sum / count` and `stddev` carries `variance / (count - 1)`, keeping the
/// name/content pairing of the exported files stable for existing consumers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeriesSnapshot {
    pub sum: u64,
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub last: u64,
    pub avg: u64,
    pub mean: u64,
    pub stddev: u64,
}

impl SeriesU64 {
    pub fn new() -> Self {
        Self {
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
            last: AtomicU64::new(0),
            mean: AtomicU64::new(0),
            variance: AtomicU64::new(0),
            reset: ResetBlock::new(),
        }
    }

    /// Record a sample.
    pub fn add_point(&self, value: u64) {
        if self.reset.is_due() {
            self.clear();
            self.reset.complete();
        }

        self.min.fetch_min(value, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);
        let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        self.last.store(value, Ordering::Relaxed);
        self.sum.fetch_add(value, Ordering::Relaxed);

        // Welford in integer arithmetic: the mean converges within one unit
        // and the variance accumulates delta * delta2 about the running mean
        let mean = self.mean.load(Ordering::Relaxed) as i64;
        let delta = value as i64 - mean;
        let mean = mean + delta / count as i64;
        self.mean.store(mean as u64, Ordering::Relaxed);
        let delta2 = value as i64 - mean;
        let variance = self.variance.load(Ordering::Relaxed) as i64 + delta * delta2;
        self.variance.store(variance as u64, Ordering::Relaxed);
    }

    fn clear(&self) {
        self.sum.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
        self.min.store(u64::MAX, Ordering::Relaxed);
        self.max.store(0, Ordering::Relaxed);
        self.last.store(0, Ordering::Relaxed);
        self.mean.store(0, Ordering::Relaxed);
        self.variance.store(0, Ordering::Relaxed);
    }

    /// Returns the masked view the exported files render.
    pub fn snapshot(&self) -> SeriesSnapshot {
        if self.reset.pending() {
            return SeriesSnapshot::default();
        }

        let count = self.count.load(Ordering::Relaxed);
        let sum = self.sum.load(Ordering::Relaxed);
        let variance = self.variance.load(Ordering::Relaxed);

        SeriesSnapshot {
            sum,
            count,
            min: if count == 0 {
                0
            } else {
                self.min.load(Ordering::Relaxed)
            },
            max: self.max.load(Ordering::Relaxed),
            last: self.last.load(Ordering::Relaxed),
            avg: if count == 0 { 0 } else { sum / count },
            mean: self.mean.load(Ordering::Relaxed),
            stddev: if count < 2 { 0 } else { variance / (count - 1) },
        }
    }

    /// The reset controls for this series.
    pub fn reset_block(&self) -> &ResetBlock {
        &self.reset
    }
}

impl Default for SeriesU64 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates() {
        let series = SeriesU64::new();
        for v in [1, 3, 10] {
            series.add_point(v);
        }

        let snap = series.snapshot();
        assert_eq!(snap.sum, 14);
        assert_eq!(snap.count, 3);
        assert_eq!(snap.min, 1);
        assert_eq!(snap.max, 10);
        assert_eq!(snap.last, 10);
        assert_eq!(snap.avg, 4);
        assert_eq!(snap.mean, 4);
        // integer Welford over 1, 3, 10 accumulates 50; exported as /(n-1)
        assert_eq!(snap.stddev, 25);
    }

    #[test]
    fn empty_reads_zero() {
        let snap = SeriesU64::new().snapshot();
        assert_eq!(snap, SeriesSnapshot::default());
    }

    #[test]
    fn pending_reset_masks_values() {
        let series = SeriesU64::new();
        series.add_point(5);
        series.reset_block().request();

        assert_eq!(series.snapshot(), SeriesSnapshot::default());
    }

    #[test]
    fn reset_applies_on_next_point() {
        let series = SeriesU64::new();
        for v in [100, 200] {
            series.add_point(v);
        }
        series.reset_block().request();
        for v in [1, 3] {
            series.add_point(v);
        }

        let snap = series.snapshot();
        assert_eq!(snap.count, 2);
        assert_eq!(snap.sum, 4);
        assert_eq!(snap.min, 1);
        assert_eq!(snap.max, 3);
        assert_eq!(snap.last, 3);
    }

    #[test]
    fn single_sample() {
        let series = SeriesU64::new();
        series.add_point(7);

        let snap = series.snapshot();
        assert_eq!(snap.min, 7);
        assert_eq!(snap.max, 7);
        assert_eq!(snap.mean, 7);
        assert_eq!(snap.stddev, 0);
    }
}
