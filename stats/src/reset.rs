// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::coarse_secs;

use core::sync::atomic::AtomicU32;
use core::sync::atomic::AtomicU64;
use core::sync::atomic::Ordering;

/// Clear-on-demand and clear-on-interval state shared by the accumulators.
///
/// A reset is requested by storing the flag (relaxed) and is applied by the
/// writer on its next recorded point: the accumulator zeroes its fields and
/// then clears the flag with release ordering, so a reader that still
/// observes the flag with acquire ordering reports zeroes itself and a
/// reader that observes the cleared flag sees the zeroed fields. A reset may
/// race with a concurrent point; that point may land before or after the
/// clear, or be lost. Nothing here ever runs under a lock.
pub struct ResetBlock {
    flag: AtomicU32,
    interval_secs: AtomicU64,
    last_reset: AtomicU64,
}

impl ResetBlock {
    pub fn new() -> Self {
        Self {
            flag: AtomicU32::new(0),
            interval_secs: AtomicU64::new(0),
            last_reset: AtomicU64::new(coarse_secs()),
        }
    }

    /// Request a clear; it takes effect on the next recorded point.
    pub fn request(&self) {
        self.flag.store(1, Ordering::Relaxed);
    }

    /// True while a requested clear has not yet been applied. Readers that
    /// observe this report zeroed values.
    pub fn pending(&self) -> bool {
        self.flag.load(Ordering::Acquire) != 0
    }

    /// Called by the writer before recording a point. Returns true when the
    /// accumulator must clear itself first, either because the periodic
    /// interval elapsed (the reset timestamp is advanced here) or because a
    /// clear was requested.
    pub fn is_due(&self) -> bool {
        self.is_due_at(coarse_secs())
    }

    fn is_due_at(&self, now: u64) -> bool {
        let interval = self.interval_secs.load(Ordering::Relaxed);
        if interval > 0 && now.saturating_sub(self.last_reset.load(Ordering::Relaxed)) > interval {
            self.last_reset.store(now, Ordering::Relaxed);
            return true;
        }
        self.flag.load(Ordering::Relaxed) != 0
    }

    /// Called by the writer after zeroing the accumulator fields.
    pub fn complete(&self) {
        self.flag.store(0, Ordering::Release);
    }

    /// Periodic reset interval in seconds; zero disables periodic resets.
    pub fn interval(&self) -> u64 {
        self.interval_secs.load(Ordering::Relaxed)
    }

    pub fn set_interval(&self, secs: u64) {
        self.interval_secs.store(secs, Ordering::Relaxed);
    }
}

impl Default for ResetBlock {
    fn default() -> Self {
        Self::new()
    }
}
