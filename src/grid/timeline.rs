use chrono::{DateTime, FixedOffset, Timelike, Utc};

use crate::types::{HistoricalPoint, PredictionPoint, TimelinePoint};

/// Merge history and forecast into one chart series.
///
/// History comes first, then at most `horizon` predictions. Every point gets a
/// sequential `index` from 0; timestamps from the two sources are not on a
/// common grid, so they are never used as keys. An empty forecast yields the
/// history alone.
pub fn stitch(
    historical: &[HistoricalPoint],
    predictions: &[PredictionPoint],
    horizon: usize,
    offset: FixedOffset,
) -> Vec<TimelinePoint> {
    let past = historical.iter().map(|h| TimelinePoint {
        index: 0,
        label: time_label(h.timestamp, offset),
        timestamp: h.timestamp,
        historical_mw: Some(h.historical_mw),
        predicted_mw: None,
        lower_bound: None,
        upper_bound: None,
        confidence_width: None,
    });

    let future = predictions.iter().take(horizon).map(|p| TimelinePoint {
        index: 0,
        label: time_label(p.timestamp, offset),
        timestamp: p.timestamp,
        historical_mw: None,
        predicted_mw: Some(p.predicted_mw),
        lower_bound: p.lower_bound,
        upper_bound: p.upper_bound,
        confidence_width: confidence_width(p.lower_bound, p.upper_bound),
    });

    past.chain(future)
        .enumerate()
        .map(|(index, point)| TimelinePoint { index, ..point })
        .collect()
}

/// `upper - lower` when both bounds are known.
pub fn confidence_width(lower: Option<f64>, upper: Option<f64>) -> Option<f64> {
    match (lower, upper) {
        (Some(lo), Some(hi)) => Some(hi - lo),
        _ => None,
    }
}

/// Display-only label such as `Fri 5 p.m.`, in the given local offset.
pub fn time_label(ts: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = ts.with_timezone(&offset);
    let meridiem = if local.hour() < 12 { "a.m." } else { "p.m." };
    format!("{} {meridiem}", local.format("%a %-I"))
}
