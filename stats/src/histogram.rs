// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::ResetBlock;

use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering;

use vitals_histogram::{Histogram, HistogramError};

/// Computes the representative values for the tracked fractions from the
/// bucket counts and the sample count.
pub type ComputeFn = fn(&Histogram, u64, &[f64]) -> Vec<u64>;

fn engine_percentiles(histogram: &Histogram, total: u64, fractions: &[f64]) -> Vec<u64> {
    // fractions were validated when the accumulator was built
    histogram.percentiles(total, fractions).unwrap_or_default()
}

/// A latency accumulator over `u32` samples: count, sum, last value, plus a
/// log-linear [`Histogram`] for percentile readouts.
///
/// Like [`SeriesU64`](crate::SeriesU64), recording is lock-free and readers
/// are eventually consistent. Percentiles are recomputed from the live
/// buckets on every readout.
pub struct HistogramU32 {
    sum: AtomicU64,
    count: AtomicU64,
    last: AtomicU64,
    fractions: Box<[f64]>,
    histogram: Histogram,
    compute: ComputeFn,
    reset: ResetBlock,
}

/// A masked point-in-time view of the scalar fields of a [`HistogramU32`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HistogramSnapshot {
    pub sum: u64,
    pub count: u64,
    pub last: u64,
    pub avg: u64,
}

impl HistogramU32 {
    /// Build an accumulator tracking the given fractions, each in
    /// `(0.0, 1.0]` and ascending.
    pub fn new(fractions: &[f64]) -> Result<Self, HistogramError> {
        Self::with_compute(fractions, engine_percentiles)
    }

    /// Build an accumulator with a custom percentile computation.
    pub fn with_compute(fractions: &[f64], compute: ComputeFn) -> Result<Self, HistogramError> {
        let histogram = Histogram::new();
        histogram.percentiles(0, fractions)?;

        Ok(Self {
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            last: AtomicU64::new(0),
            fractions: fractions.into(),
            histogram,
            compute,
            reset: ResetBlock::new(),
        })
    }

    /// Record a sample.
    pub fn add_point(&self, value: u32) {
        if self.reset.is_due() {
            self.sum.store(0, Ordering::Relaxed);
            self.count.store(0, Ordering::Relaxed);
            self.last.store(0, Ordering::Relaxed);
            self.histogram.clear();
            self.reset.complete();
        }

        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(value as u64, Ordering::Relaxed);
        self.last.store(value as u64, Ordering::Relaxed);
        self.histogram.increment(value);
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        if self.reset.pending() {
            return HistogramSnapshot::default();
        }

        let count = self.count.load(Ordering::Relaxed);
        let sum = self.sum.load(Ordering::Relaxed);

        HistogramSnapshot {
            sum,
            count,
            last: self.last.load(Ordering::Relaxed),
            avg: if count == 0 { 0 } else { sum / count },
        }
    }

    /// The tracked fractions, in the order they were supplied.
    pub fn fractions(&self) -> &[f64] {
        &self.fractions
    }

    /// Recompute the representative value for every tracked fraction. While
    /// a reset is pending the values read zero.
    pub fn percentile_values(&self) -> Vec<u64> {
        if self.reset.pending() {
            return vec![0; self.fractions.len()];
        }

        let count = self.count.load(Ordering::Relaxed);
        (self.compute)(&self.histogram, count, &self.fractions)
    }

    /// The reset controls for this accumulator.
    pub fn reset_block(&self) -> &ResetBlock {
        &self.reset
    }
}
