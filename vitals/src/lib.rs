// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Live in-process statistics exposed to operators as a filesystem.
//!
//! A host process registers counters, tunables, running series, and latency
//! histograms into a [`Tree`]; mounting the tree with [`Vitals`] makes every
//! statistic show up as a file under the mountpoint, readable with `cat`,
//! `ls`, and ordinary shell pipelines. Reads render values straight out of
//! live program memory — nothing is flushed or sampled — and a few control
//! files accept writes to reset or reconfigure a statistic.
//!
//! ```text
//! $ cat /run/myapp-stats/request_latency/99.99
//! 1003520
//! $ echo 1 > /run/myapp-stats/request_latency/reset
//! ```
//!
//! Application threads record points lock-free ([`SeriesU64::add_point`],
//! [`HistogramU32::add_point`]); one serving thread answers kernel requests
//! by walking the tree under its single mutex. Aggregator files stream a
//! `path:value` dump of a whole subtree for log shippers that want
//! everything in one read.

mod aggregator;
mod arena;
mod context;
mod error;
mod formatter;
mod fs;
mod item;
mod tree;

pub use context::*;
pub use error::*;
pub use formatter::*;
pub use item::ItemId;
pub use tree::{SeriesU64Handle, Tree};

pub use vitals_stats::{HistogramSnapshot, HistogramU32, ResetBlock, SeriesSnapshot, SeriesU64};
