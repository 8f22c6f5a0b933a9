// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! A coarse monotonic clock with one-second resolution.
//!
//! Interval resets compare whole seconds, so the cheap coarse clock source
//! is preferred where the platform offers one.

#[cfg(target_os = "linux")]
const CLOCK_ID: libc::clockid_t = libc::CLOCK_MONOTONIC_COARSE;

#[cfg(not(target_os = "linux"))]
const CLOCK_ID: libc::clockid_t = libc::CLOCK_MONOTONIC;

/// Returns seconds from the monotonic coarse clock.
pub fn coarse_secs() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    // only fails for an invalid clock id
    unsafe {
        libc::clock_gettime(CLOCK_ID, &mut ts);
    }

    ts.tv_sec as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic() {
        let a = coarse_secs();
        let b = coarse_secs();
        assert!(b >= a);
    }
}
