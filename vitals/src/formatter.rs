// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Render and parse callbacks attached to value files.
//!
//! A value file does not hold data of its own; it holds a [`ReadFormatter`]
//! that renders some live object into text on every read, and optionally a
//! [`WriteFormatter`] that parses text written by an operator back into the
//! object. The object itself lives inside the closure, typically as an
//! `Arc` of an atomic shared with the host's hot path. The `tag` argument
//! is passed through from registration, for callbacks that serve a family
//! of files from one object.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Renders the current value as newline-terminated text. Must not call back
/// into the statistics tree.
pub type ReadFormatter = Arc<dyn Fn(u64, &mut String) + Send + Sync>;

/// Parses an operator write. Returns the number of values parsed; exactly
/// one means success, anything else is reported as an invalid argument.
pub type WriteFormatter = Arc<dyn Fn(u64, &[u8]) -> usize + Send + Sync>;

/// Registration descriptor for one value file.
pub struct Simple {
    pub name: String,
    pub tag: u64,
    pub read: ReadFormatter,
    pub write: Option<WriteFormatter>,
}

impl Simple {
    pub fn new(name: impl Into<String>, read: ReadFormatter) -> Self {
        Self {
            name: name.into(),
            tag: 0,
            read,
            write: None,
        }
    }

    pub fn with_writer(mut self, write: WriteFormatter) -> Self {
        self.write = Some(write);
        self
    }

    pub fn with_tag(mut self, tag: u64) -> Self {
        self.tag = tag;
        self
    }
}

/// Registration descriptor for a `start`/`end` pair of value files grouped
/// under a sub-directory.
pub struct StartEnd {
    pub name: String,
    pub start: ReadFormatter,
    pub end: ReadFormatter,
}

impl StartEnd {
    pub fn new(name: impl Into<String>, start: ReadFormatter, end: ReadFormatter) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    /// A `start`/`end` pair over two shared `u64` counters, rendered in
    /// decimal.
    pub fn u64(name: impl Into<String>, start: &Arc<AtomicU64>, end: &Arc<AtomicU64>) -> Self {
        Self::new(name, u64_decimal(start), u64_decimal(end))
    }

    /// A `start`/`end` pair over two shared `u32` counters, rendered in
    /// decimal.
    pub fn u32(name: impl Into<String>, start: &Arc<AtomicU32>, end: &Arc<AtomicU32>) -> Self {
        Self::new(name, u32_decimal(start), u32_decimal(end))
    }
}

/// Decimal rendering of a shared `u64`.
pub fn u64_decimal(value: &Arc<AtomicU64>) -> ReadFormatter {
    let value = Arc::clone(value);
    Arc::new(move |_tag, out| {
        let _ = writeln!(out, "{}", value.load(Ordering::Relaxed));
    })
}

/// Hexadecimal rendering of a shared `u64`.
pub fn u64_hex(value: &Arc<AtomicU64>) -> ReadFormatter {
    let value = Arc::clone(value);
    Arc::new(move |_tag, out| {
        let _ = writeln!(out, "{:x}", value.load(Ordering::Relaxed));
    })
}

/// `0x`-prefixed rendering of a shared `u64`, for pointers and cookies.
pub fn u64_address(value: &Arc<AtomicU64>) -> ReadFormatter {
    let value = Arc::clone(value);
    Arc::new(move |_tag, out| {
        let _ = writeln!(out, "0x{:x}", value.load(Ordering::Relaxed));
    })
}

/// Decimal rendering of a shared `u32`.
pub fn u32_decimal(value: &Arc<AtomicU32>) -> ReadFormatter {
    let value = Arc::clone(value);
    Arc::new(move |_tag, out| {
        let _ = writeln!(out, "{}", value.load(Ordering::Relaxed));
    })
}

/// Hexadecimal rendering of a shared `u32`.
pub fn u32_hex(value: &Arc<AtomicU32>) -> ReadFormatter {
    let value = Arc::clone(value);
    Arc::new(move |_tag, out| {
        let _ = writeln!(out, "{:x}", value.load(Ordering::Relaxed));
    })
}

/// Decimal rendering of a shared `i64`.
pub fn i64_decimal(value: &Arc<AtomicI64>) -> ReadFormatter {
    let value = Arc::clone(value);
    Arc::new(move |_tag, out| {
        let _ = writeln!(out, "{}", value.load(Ordering::Relaxed));
    })
}

/// Decimal parser storing into a shared `u64`.
pub fn u64_decimal_writer(value: &Arc<AtomicU64>) -> WriteFormatter {
    let value = Arc::clone(value);
    Arc::new(move |_tag, buf| match parse_decimal::<u64>(buf) {
        Some(v) => {
            value.store(v, Ordering::Relaxed);
            1
        }
        None => 0,
    })
}

/// Decimal parser storing into a shared `u32`.
pub fn u32_decimal_writer(value: &Arc<AtomicU32>) -> WriteFormatter {
    let value = Arc::clone(value);
    Arc::new(move |_tag, buf| match parse_decimal::<u32>(buf) {
        Some(v) => {
            value.store(v, Ordering::Relaxed);
            1
        }
        None => 0,
    })
}

/// Decimal parser storing into a shared `i64`.
pub fn i64_decimal_writer(value: &Arc<AtomicI64>) -> WriteFormatter {
    let value = Arc::clone(value);
    Arc::new(move |_tag, buf| match parse_decimal::<i64>(buf) {
        Some(v) => {
            value.store(v, Ordering::Relaxed);
            1
        }
        None => 0,
    })
}

/// Parses a decimal value from an operator write, tolerating the trailing
/// newline shells append.
pub(crate) fn parse_decimal<T: std::str::FromStr>(buf: &[u8]) -> Option<T> {
    let text = std::str::from_utf8(buf).ok()?;
    text.trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .parse()
        .ok()
}
