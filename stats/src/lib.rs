// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Running statistics accumulators designed for one hot writer path and
//! concurrent readers.
//!
//! Two accumulators are provided: [`SeriesU64`] tracks count, sum, min, max,
//! last value, and online mean/variance via Welford's algorithm;
//! [`HistogramU32`] additionally buckets samples for percentile extraction.
//! Recording a point never takes a lock: every field is a relaxed atomic, so
//! a snapshot taken while a writer is mid-update may mix old and new fields.
//! Readouts are eventually consistent, which is the intended trade for
//! keeping `add_point` off any serialization path.
//!
//! Both accumulators carry a [`ResetBlock`]: a clear can be requested
//! on demand or scheduled at a fixed interval, and takes effect on the next
//! recorded point. Until then, readers observing the pending flag report
//! zeroed values.

mod clock;
mod histogram;
mod reset;
mod series;

pub use clock::*;
pub use histogram::*;
pub use reset::*;
pub use series::*;
