use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Live reading
// ---------------------------------------------------------------------------

/// Grid status derived from instantaneous usage. Variant order is severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GridStatus {
    Stable,
    Warning,
    Critical,
}

impl std::fmt::Display for GridStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GridStatus::Stable => "STABLE",
            GridStatus::Warning => "WARNING",
            GridStatus::Critical => "CRITICAL",
        };
        write!(f, "{s}")
    }
}

/// One poll of the live-usage upstream. Wire shape of `/api/live-usage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveReading {
    pub usage_mw: f64,
    pub capacity_percent: u32,
    pub last_updated: DateTime<Utc>,
    pub status: GridStatus,
    /// True for fallback/placeholder readings, never for real telemetry.
    pub is_mock: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Top-level keys of an upstream payload we could not read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_keys: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Forecast
// ---------------------------------------------------------------------------

/// Forecaster's own risk label for a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Warning,
    Critical,
}

impl RiskLevel {
    pub fn is_risky(self) -> bool {
        !matches!(self, RiskLevel::Safe)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Warning => "warning",
            RiskLevel::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionPoint {
    pub timestamp: DateTime<Utc>,
    pub predicted_mw: f64,
    /// Both bounds present or both absent, and `lower <= upper`.
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub capacity_pct: Option<f64>,
    pub risk_level: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
}

/// Sanitized forecast feed, ascending by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictionFeed {
    pub generated_at: Option<String>,
    pub predictions: Vec<PredictionPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub mae_mw: f64,
    pub accuracy_200mw: f64,
    pub accuracy_500mw: f64,
    pub trained_at: String,
    pub has_temperature: bool,
}

impl AccuracyReport {
    /// `100 - mae / capacity * 100`.
    pub fn headline_accuracy_pct(&self, max_capacity_mw: f64) -> f64 {
        if max_capacity_mw <= 0.0 {
            return 0.0;
        }
        100.0 - (self.mae_mw / max_capacity_mw * 100.0)
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoricalPoint {
    pub timestamp: DateTime<Utc>,
    pub historical_mw: f64,
}

/// One chart sample. `index` is the only join key guaranteed unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub index: usize,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub historical_mw: Option<f64>,
    pub predicted_mw: Option<f64>,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub confidence_width: Option<f64>,
}

// ---------------------------------------------------------------------------
// Risk countdown
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskWindow {
    pub timestamp: DateTime<Utc>,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub hours: u64,
    /// 0..=59
    pub minutes: u64,
    /// 0..=59
    pub seconds: u64,
}

impl std::fmt::Display for Countdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}h {}m {}s", self.hours, self.minutes, self.seconds)
    }
}
