use chrono::{DateTime, Utc};

use crate::config::{GridThresholds, FALLBACK_USAGE_MW};
use crate::types::{Countdown, GridStatus, LiveReading, PredictionPoint, RiskLevel, RiskWindow};

/// Strict `>` against each cutoff; a pure function of the current value.
/// There is no hysteresis, so usage hovering at a threshold flaps.
pub fn classify(usage_mw: f64, thresholds: &GridThresholds) -> GridStatus {
    if usage_mw > thresholds.critical_threshold_mw {
        GridStatus::Critical
    } else if usage_mw > thresholds.warning_threshold_mw {
        GridStatus::Warning
    } else {
        GridStatus::Stable
    }
}

/// `round(usage / max * 100)`, clamped at 0.
pub fn capacity_percent(usage_mw: f64, max_capacity_mw: f64) -> u32 {
    if max_capacity_mw <= 0.0 || !usage_mw.is_finite() {
        return 0;
    }
    (usage_mw / max_capacity_mw * 100.0).round().max(0.0) as u32
}

/// Soonest future prediction labelled warning or critical.
///
/// First match in ascending order wins; a later critical entry never
/// displaces an earlier warning.
pub fn next_risk_window(predictions: &[PredictionPoint], now: DateTime<Utc>) -> Option<RiskWindow> {
    predictions
        .iter()
        .find(|p| p.timestamp > now && p.risk_level.is_risky())
        .map(|p| RiskWindow { timestamp: p.timestamp, risk_level: p.risk_level })
}

/// Time left until `window`, or None when there is none or it is not ahead of `now`.
pub fn countdown(window: Option<&RiskWindow>, now: DateTime<Utc>) -> Option<Countdown> {
    let window = window?;
    let diff_ms = (window.timestamp - now).num_milliseconds();
    if diff_ms <= 0 {
        return None;
    }
    let diff_ms = diff_ms as u64;
    Some(Countdown {
        hours: diff_ms / 3_600_000,
        minutes: (diff_ms % 3_600_000) / 60_000,
        seconds: (diff_ms % 60_000) / 1_000,
    })
}

/// Human line shown next to the status badge.
pub fn countdown_message(window: Option<&RiskWindow>, countdown: Option<&Countdown>) -> String {
    match (window, countdown) {
        (Some(w), Some(c)) => {
            let kind = match w.risk_level {
                RiskLevel::Critical => "critical",
                _ => "elevated",
            };
            format!("Next {kind} period in {c}")
        }
        _ => "No risk periods ahead".to_string(),
    }
}

/// Reading built from a real upstream value.
pub fn measured_reading(usage_mw: f64, now: DateTime<Utc>, thresholds: &GridThresholds) -> LiveReading {
    LiveReading {
        usage_mw,
        capacity_percent: capacity_percent(usage_mw, thresholds.max_capacity_mw),
        last_updated: now,
        status: classify(usage_mw, thresholds),
        is_mock: false,
        error: None,
        raw_keys: None,
    }
}

/// Placeholder reading used whenever the upstream cannot be read. Always STABLE.
pub fn fallback_reading(
    now: DateTime<Utc>,
    thresholds: &GridThresholds,
    error: impl Into<String>,
    raw_keys: Option<Vec<String>>,
) -> LiveReading {
    LiveReading {
        usage_mw: FALLBACK_USAGE_MW,
        capacity_percent: capacity_percent(FALLBACK_USAGE_MW, thresholds.max_capacity_mw),
        last_updated: now,
        status: GridStatus::Stable,
        is_mock: true,
        error: Some(error.into()),
        raw_keys,
    }
}
