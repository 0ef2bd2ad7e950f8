use std::sync::{Arc, RwLock};

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::config::GridThresholds;
use crate::grid::HistorySource;
use crate::grid::status::{countdown, countdown_message, fallback_reading, next_risk_window};
use crate::grid::timeline::stitch;
use crate::types::{
    AccuracyReport, Countdown, GridStatus, LiveReading, PredictionFeed, RiskWindow,
    TimelinePoint,
};

// ---------------------------------------------------------------------------
// ForecastSnapshot
// ---------------------------------------------------------------------------

/// The last forecast fetch. History is not kept here; it is rebuilt for
/// every read so the timeline always ends at the time of the request.
#[derive(Debug, Clone, Default)]
pub struct ForecastSnapshot {
    pub feed: PredictionFeed,
    pub fetched_at: Option<DateTime<Utc>>,
    /// False until a forecast fetch has succeeded.
    pub available: bool,
}

// ---------------------------------------------------------------------------
// GridView: composed read model for the dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct GridView {
    pub live: LiveReading,
    pub max_capacity_mw: f64,
    pub warning_threshold_mw: f64,
    pub critical_threshold_mw: f64,
    pub status: GridStatus,
    pub next_risk_window: Option<RiskWindow>,
    pub countdown: Option<Countdown>,
    pub countdown_message: String,
    pub forecast_available: bool,
    pub timeline: Vec<TimelinePoint>,
}

// ---------------------------------------------------------------------------
// GridStore
// ---------------------------------------------------------------------------

/// Latest value of each feed. Writers replace whole values; readers clone.
/// The live reading and forecast are updated independently and may be from
/// different moments.
pub struct GridStore {
    thresholds: GridThresholds,
    horizon: usize,
    offset: FixedOffset,
    history: Arc<dyn HistorySource>,
    live: RwLock<LiveReading>,
    forecast: RwLock<ForecastSnapshot>,
    accuracy: RwLock<Option<AccuracyReport>>,
}

impl GridStore {
    pub fn new(
        thresholds: GridThresholds,
        horizon: usize,
        offset: FixedOffset,
        history: Arc<dyn HistorySource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            thresholds,
            horizon,
            offset,
            history,
            live: RwLock::new(fallback_reading(
                Utc::now(),
                &thresholds,
                "Awaiting first live poll",
                None,
            )),
            forecast: RwLock::new(ForecastSnapshot::default()),
            accuracy: RwLock::new(None),
        })
    }

    pub fn thresholds(&self) -> &GridThresholds {
        &self.thresholds
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn set_live(&self, reading: LiveReading) {
        *self.live.write().unwrap_or_else(|e| e.into_inner()) = reading;
    }

    pub fn live(&self) -> LiveReading {
        self.live.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Install the result of a forecast fetch.
    ///
    /// A failed fetch (`None`) keeps the previous good forecast if there is
    /// one; otherwise the timeline degrades to history alone.
    pub fn apply_forecast(&self, feed: Option<PredictionFeed>, now: DateTime<Utc>) {
        let mut snapshot = self.forecast.write().unwrap_or_else(|e| e.into_inner());
        match feed {
            Some(feed) => {
                *snapshot = ForecastSnapshot {
                    feed,
                    fetched_at: Some(now),
                    available: true,
                };
            }
            None if snapshot.available => {}
            None => *snapshot = ForecastSnapshot::default(),
        }
    }

    pub fn forecast(&self) -> ForecastSnapshot {
        self.forecast.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_accuracy(&self, report: AccuracyReport) {
        *self.accuracy.write().unwrap_or_else(|e| e.into_inner()) = Some(report);
    }

    pub fn accuracy(&self) -> Option<AccuracyReport> {
        self.accuracy.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Trailing history ending at `now`, followed by the stored forecast.
    pub fn timeline(&self, now: DateTime<Utc>) -> Vec<TimelinePoint> {
        let history = self.history.history(now);
        let snapshot = self.forecast.read().unwrap_or_else(|e| e.into_inner());
        stitch(&history, &snapshot.feed.predictions, self.horizon, self.offset)
    }

    /// Compose the dashboard view as of `now`.
    pub fn view(&self, now: DateTime<Utc>) -> GridView {
        let live = self.live();
        let snapshot = self.forecast();
        let timeline = self.timeline(now);

        let window = next_risk_window(&snapshot.feed.predictions, now);
        let remaining = countdown(window.as_ref(), now);
        let message = countdown_message(window.as_ref(), remaining.as_ref());

        GridView {
            status: live.status,
            live,
            max_capacity_mw: self.thresholds.max_capacity_mw,
            warning_threshold_mw: self.thresholds.warning_threshold_mw,
            critical_threshold_mw: self.thresholds.critical_threshold_mw,
            next_risk_window: window,
            countdown: remaining,
            countdown_message: message,
            forecast_available: snapshot.available,
            timeline,
        }
    }
}
