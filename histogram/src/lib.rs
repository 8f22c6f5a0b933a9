// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A fixed-layout log-linear histogram for `u32` samples.
//!
//! Values are grouped by the position of their most significant bit and then
//! split into `2^M` uniform buckets per group, so the relative error of any
//! bucket's representative value is bounded by `1 / 2^(M+1)` — under one
//! percent at the default `M = 6`. Recording a sample is a single relaxed
//! atomic increment, which keeps the hot path safe to call from any thread.
//!
//! The layout is fixed at 19 groups of 64 buckets (1216 slots). Small values
//! below `2^(M+1)` are stored exactly; values whose most significant bit is
//! beyond the last group saturate into the final bucket.

mod bucket;
mod error;
mod histogram;

pub use bucket::*;
pub use error::*;
pub use histogram::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build() {
        let h = Histogram::new();
        assert_eq!(h.percentiles(0, &[0.5]), Ok(vec![0]));
        h.increment(1);
        assert_eq!(h.percentiles(1, &[0.5]), Ok(vec![1]));
        assert_eq!(h.percentiles(1, &[1.0]), Ok(vec![1]));
    }

    #[test]
    fn rejects_bad_fractions() {
        let h = Histogram::new();
        h.increment(1);
        assert_eq!(
            h.percentiles(1, &[0.0]),
            Err(HistogramError::InvalidFraction)
        );
        assert_eq!(
            h.percentiles(1, &[1.1]),
            Err(HistogramError::InvalidFraction)
        );
        assert_eq!(
            h.percentiles(1, &[0.9, 0.5]),
            Err(HistogramError::NotAscending)
        );
    }
}
