// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Mounts a small statistics tree and feeds it synthetic traffic:
//!
//! ```text
//! cargo run --example demo -- /tmp/vitals-demo
//! cat /tmp/vitals-demo/requests
//! cat /tmp/vitals-demo/latency/histogram/99
//! cat /tmp/vitals-demo/latency/all
//! echo 1 > /tmp/vitals-demo/latency/us/reset
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vitals::{HistogramU32, SeriesU64, Vitals};

fn main() -> vitals::Result<()> {
    env_logger::init();

    let mountpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/tmp/vitals-demo".to_string());
    let vitals = Arc::new(Vitals::create(&mountpoint)?);

    let requests = Arc::new(AtomicU64::new(0));
    vitals.create_u64(None, "requests", &requests)?;

    let limit = Arc::new(AtomicU64::new(100));
    vitals.create_u64_parameter(None, "limit", &limit)?;

    let latency = vitals.create_directory(None, "latency")?;
    let series = Arc::new(SeriesU64::new());
    vitals.create_u64_series(Some(latency), "us", &series)?;
    let histogram =
        Arc::new(HistogramU32::new(&[0.5, 0.9, 0.99, 0.9999]).expect("fractions are ascending"));
    vitals.create_histogram_u32_series(Some(latency), "histogram", &histogram)?;
    vitals.create_aggregator(Some(latency), "all")?;

    let server = Arc::clone(&vitals);
    let looper = std::thread::spawn(move || server.run());

    println!("serving statistics under {} for 60s", mountpoint);
    for i in 0u64..600 {
        requests.fetch_add(1, Ordering::Relaxed);
        let sample = 50 + (i * 37) % 1000;
        series.add_point(sample);
        histogram.add_point(sample as u32);
        std::thread::sleep(Duration::from_millis(100));
    }

    vitals.stop();
    looper.join().expect("serving thread panicked")
}
