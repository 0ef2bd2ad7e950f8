use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::Config;
use crate::fetcher::{fetch_accuracy, fetch_live_reading, fetch_predictions};
use crate::state::GridStore;

// ---------------------------------------------------------------------------
// LivePoller
// ---------------------------------------------------------------------------

/// Replaces the store's live reading on every tick. A failed upstream call
/// still produces a (mock) reading; the next tick is the retry.
pub struct LivePoller {
    client: reqwest::Client,
    cfg: Config,
    store: Arc<GridStore>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
}

impl LivePoller {
    pub fn new(
        client: reqwest::Client,
        cfg: Config,
        store: Arc<GridStore>,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
    ) -> Self {
        Self { client, cfg, store, health, latency }
    }

    pub async fn tick(&self) {
        let reading = fetch_live_reading(&self.client, &self.cfg, &self.latency).await;

        if reading.is_mock {
            warn!(
                usage_mw = reading.usage_mw,
                error = reading.error.as_deref().unwrap_or("n/a"),
                "Live poll degraded to fallback reading"
            );
        } else {
            info!(
                usage_mw = reading.usage_mw,
                capacity_percent = reading.capacity_percent,
                status = %reading.status,
                "Live poll complete",
            );
        }

        self.health.record_live_poll(now_ms(), reading.is_mock);
        self.store.set_live(reading);
    }
}

// ---------------------------------------------------------------------------
// ForecastPoller
// ---------------------------------------------------------------------------

/// Fetches the forecast (and accuracy, when configured) and installs it in
/// the store.
pub struct ForecastPoller {
    client: reqwest::Client,
    cfg: Config,
    store: Arc<GridStore>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
}

impl ForecastPoller {
    pub fn new(
        client: reqwest::Client,
        cfg: Config,
        store: Arc<GridStore>,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
    ) -> Self {
        Self { client, cfg, store, health, latency }
    }

    pub async fn tick(&self) {
        let now = Utc::now();

        let feed = match fetch_predictions(&self.client, &self.cfg, &self.latency).await {
            Ok(feed) => Some(feed),
            Err(e) => {
                error!(source = %self.cfg.predictions_url, "Forecast fetch failed: {e}");
                None
            }
        };
        let ok = feed.is_some();
        self.store.apply_forecast(feed, now);
        self.health.record_forecast(now_ms(), ok);

        let snapshot = self.store.forecast();
        info!(
            points = snapshot.feed.predictions.len(),
            forecast_available = snapshot.available,
            "Forecast installed"
        );

        if let Some(source) = self.cfg.accuracy_url.as_deref() {
            match fetch_accuracy(&self.client, source).await {
                Ok(report) => {
                    info!(mae_mw = report.mae_mw, trained_at = %report.trained_at, "Accuracy report loaded");
                    self.store.set_accuracy(report);
                }
                Err(e) => warn!(source, "Accuracy fetch failed: {e}"),
            }
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
