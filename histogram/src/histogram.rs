// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::*;

use core::sync::atomic::AtomicU32;
use core::sync::atomic::Ordering;

/// A `Histogram` counts recorded `u32` samples in log-linear buckets and
/// extracts approximate percentiles from the counts.
///
/// Recording is a relaxed atomic increment; readers may observe counts that
/// are mid-update, which is acceptable for statistics reporting.
pub struct Histogram {
    buckets: Box<[AtomicU32]>,
}

impl Histogram {
    /// Construct a histogram with the fixed log-linear layout of
    /// [`NUM_BUCKETS`] buckets.
    pub fn new() -> Self {
        let mut buckets = Vec::new();
        buckets.resize_with(NUM_BUCKETS, || AtomicU32::new(0));

        Self {
            buckets: buckets.into_boxed_slice(),
        }
    }

    /// Increment the bucket corresponding to `value` by one.
    ///
    /// This operation wraps on overflow.
    pub fn increment(&self, value: u32) {
        self.buckets[value_to_index(value)].fetch_add(1, Ordering::Relaxed);
    }

    /// Zero every bucket.
    pub fn clear(&self) {
        for bucket in self.buckets.iter() {
            bucket.store(0, Ordering::Relaxed);
        }
    }

    /// Number of buckets in the layout.
    pub fn buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the representative value for each requested fraction in a
    /// single sweep over the buckets.
    ///
    /// `total` is the sample count maintained by the caller; it may disagree
    /// with the bucket sums while another thread is recording, in which case
    /// unresolved fractions are padded with the highest populated bucket.
    /// Fractions must be ascending and each within `(0.0, 1.0]`; with a
    /// `total` of zero every fraction resolves to the first bucket.
    pub fn percentiles(&self, total: u64, fractions: &[f64]) -> Result<Vec<u64>, HistogramError> {
        for fraction in fractions {
            if !(*fraction > 0.0 && *fraction <= 1.0) {
                return Err(HistogramError::InvalidFraction);
            }
        }
        for pair in fractions.windows(2) {
            if pair[0] > pair[1] {
                return Err(HistogramError::NotAscending);
            }
        }

        let mut result = Vec::with_capacity(fractions.len());
        let mut seen: u64 = 0;
        let mut max_populated = 0;

        for (index, count) in self
            .buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed) as u64)
            .enumerate()
        {
            if count > 0 {
                max_populated = index;
            }

            seen += count;
            while result.len() < fractions.len()
                && seen as f64 >= fractions[result.len()] * total as f64
            {
                result.push(index_to_value(index));
            }

            if result.len() == fractions.len() {
                break;
            }
        }

        while result.len() < fractions.len() {
            result.push(index_to_value(max_populated));
        }

        Ok(result)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_for_small_samples() {
        let h = Histogram::new();
        for v in 0..64u32 {
            h.increment(v);
        }
        let p = h.percentiles(64, &[0.5, 1.0]).unwrap();
        assert_eq!(p, vec![31, 63]);
    }

    #[test]
    fn uniform_million() {
        let h = Histogram::new();
        for v in 0..1_000_000u32 {
            h.increment(v);
        }
        let p = h
            .percentiles(1_000_000, &[0.1, 0.6, 0.9, 0.99, 0.9999])
            .unwrap();
        assert_eq!(p, vec![99_840, 602_112, 897_024, 987_136, 1_003_520]);
    }

    #[test]
    fn relative_error_bound() {
        for shift in 0..24 {
            let v = (1u32 << shift) + (1 << shift) / 3;
            let h = Histogram::new();
            h.increment(v);
            let p = h.percentiles(1, &[1.0]).unwrap()[0];
            let err = (p as f64 - v as f64).abs() / v as f64;
            assert!(err <= 1.0 / 128.0, "value {} repr {} err {}", v, p, err);
        }
    }

    #[test]
    fn clear_zeroes_counts() {
        let h = Histogram::new();
        for v in 0..1000u32 {
            h.increment(v);
        }
        h.clear();
        assert_eq!(h.percentiles(0, &[0.5]).unwrap(), vec![0]);
    }

    #[test]
    fn several_fractions_share_a_bucket() {
        let h = Histogram::new();
        h.increment(4096);
        let p = h.percentiles(1, &[0.25, 0.5, 0.75, 1.0]).unwrap();
        assert!(p.iter().all(|v| *v == p[0]));
    }
}
