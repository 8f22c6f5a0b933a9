// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use thiserror::Error;

/// Possible errors returned by operations on a histogram.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HistogramError {
    #[error("fraction outside of the range (0.0, 1.0]")]
    /// A requested fraction is outside of the half-open range `(0.0, 1.0]`.
    InvalidFraction,
    #[error("fractions must be in ascending order")]
    /// The requested fractions are not sorted in ascending order.
    NotAscending,
}
