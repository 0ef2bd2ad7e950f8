//! Wall time of upstream feed requests (live usage and forecast), kept in
//! microseconds for `/stats/latency`.

use std::sync::Mutex;
use std::time::Duration;

const MAX_TRACKED_US: u64 = 100_000_000;

pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl LatencyStats {
    /// 1us up to the 100s ceiling, well past the 30s request timeout.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, MAX_TRACKED_US, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    /// Sub-microsecond samples count as 1us; anything past the ceiling is
    /// clamped to it instead of being dropped.
    pub fn record(&self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        if let Ok(mut h) = self.inner.lock() {
            h.saturating_record(us.clamp(1, MAX_TRACKED_US));
        }
    }

    /// (p50, p95, p99) in microseconds, or all `None` before the first fetch.
    pub fn percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        let Ok(h) = self.inner.lock() else {
            return (None, None, None);
        };
        if h.len() == 0 {
            return (None, None, None);
        }
        let p50 = h.value_at_quantile(0.5);
        let p95 = h.value_at_quantile(0.95);
        let p99 = h.value_at_quantile(0.99);
        (Some(p50), Some(p95), Some(p99))
    }

    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
