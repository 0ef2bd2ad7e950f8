//! Shared poller liveness for the /health endpoint.
//! Updated by the live and forecast pollers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Updated by the pollers, read by the API.
#[derive(Default)]
pub struct HealthState {
    /// Millisecond epoch of the last completed live poll (0 = none yet).
    pub last_live_poll_ms: AtomicU64,
    /// Millisecond epoch of the last forecast fetch attempt (0 = none yet).
    pub last_forecast_ms: AtomicU64,
    /// True while the latest live reading is a fallback.
    pub live_is_mock: AtomicBool,
    pub live_polls: AtomicU64,
    pub forecast_failures: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            live_is_mock: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn record_live_poll(&self, at_ms: u64, is_mock: bool) {
        self.last_live_poll_ms.store(at_ms, Ordering::Relaxed);
        self.live_is_mock.store(is_mock, Ordering::Relaxed);
        self.live_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forecast(&self, at_ms: u64, ok: bool) {
        self.last_forecast_ms.store(at_ms, Ordering::Relaxed);
        if !ok {
            self.forecast_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn last_live_poll_ms(&self) -> u64 {
        self.last_live_poll_ms.load(Ordering::Relaxed)
    }

    pub fn last_forecast_ms(&self) -> u64 {
        self.last_forecast_ms.load(Ordering::Relaxed)
    }

    pub fn live_is_mock(&self) -> bool {
        self.live_is_mock.load(Ordering::Relaxed)
    }

    pub fn live_polls(&self) -> u64 {
        self.live_polls.load(Ordering::Relaxed)
    }

    pub fn forecast_failures(&self) -> u64 {
        self.forecast_failures.load(Ordering::Relaxed)
    }
}
