use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use rand::Rng;

use crate::config::{HISTORY_HOURS, HISTORY_JITTER_MW};
use crate::types::HistoricalPoint;

/// Supplies the trailing 24h of load ending at `now`, oldest first.
///
/// The only implementation today is [`DiurnalSynthesizer`]; a telemetry-backed
/// source can replace it without touching the stitcher.
pub trait HistorySource: Send + Sync {
    fn history(&self, now: DateTime<Utc>) -> Vec<HistoricalPoint>;
}

/// Fabricates a plausible Alberta load curve for visual continuity.
///
/// Output is not deterministic: jitter comes from the thread RNG. Nothing
/// downstream may treat these values as measurements.
#[derive(Debug, Clone)]
pub struct DiurnalSynthesizer {
    offset: FixedOffset,
    jitter_mw: f64,
}

impl DiurnalSynthesizer {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset, jitter_mw: HISTORY_JITTER_MW }
    }

    #[cfg(test)]
    pub fn with_jitter(offset: FixedOffset, jitter_mw: f64) -> Self {
        Self { offset, jitter_mw: jitter_mw.max(0.0) }
    }

    /// One point per hour, `HISTORY_HOURS - 1` hours ago down to `now`.
    pub fn synthesize_with<R: Rng + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Vec<HistoricalPoint> {
        (0..HISTORY_HOURS)
            .rev()
            .map(|hours_ago| {
                let timestamp = now - Duration::hours(i64::from(hours_ago));
                let hour = timestamp.with_timezone(&self.offset).hour();
                let jitter = if self.jitter_mw > 0.0 {
                    rng.gen_range(-self.jitter_mw..=self.jitter_mw)
                } else {
                    0.0
                };
                HistoricalPoint {
                    timestamp,
                    historical_mw: (base_load_mw(hour) + jitter).round(),
                }
            })
            .collect()
    }
}

impl HistorySource for DiurnalSynthesizer {
    fn history(&self, now: DateTime<Utc>) -> Vec<HistoricalPoint> {
        self.synthesize_with(now, &mut rand::thread_rng())
    }
}

/// Approximate base load for a local hour of day: overnight trough, morning
/// ramp, midday plateau, evening ramp, late-evening decline.
pub fn base_load_mw(hour: u32) -> f64 {
    let h = f64::from(hour);
    match hour {
        0..=5 => 8_800.0 + h * 80.0,
        6..=9 => 9_200.0 + (h - 6.0) * 350.0,
        10..=15 => 10_400.0 + h.sin() * 200.0,
        16..=20 => 10_400.0 + (h - 16.0) * 250.0,
        _ => 11_000.0 - (h - 21.0) * 400.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mst() -> FixedOffset {
        FixedOffset::east_opt(-7 * 3600).unwrap()
    }

    fn noon_utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 20, 19, 30, 0).unwrap()
    }

    #[test]
    fn covers_trailing_day_hourly_ending_now() {
        let now = noon_utc();
        let points = DiurnalSynthesizer::new(mst()).history(now);

        assert_eq!(points.len(), 24);
        assert_eq!(points.last().unwrap().timestamp, now);
        assert_eq!(points[0].timestamp, now - Duration::hours(23));
        for pair in points.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::hours(1));
        }
    }

    #[test]
    fn without_jitter_follows_base_curve() {
        let now = noon_utc();
        let mut rng = StdRng::seed_from_u64(7);
        let points = DiurnalSynthesizer::with_jitter(mst(), 0.0).synthesize_with(now, &mut rng);

        for p in &points {
            let hour = p.timestamp.with_timezone(&mst()).hour();
            assert_eq!(p.historical_mw, base_load_mw(hour).round());
        }
        // 19:30 UTC is 12:30 MST: midday plateau.
        assert_eq!(points.last().unwrap().historical_mw, (10_400.0 + 12f64.sin() * 200.0).round());
    }

    #[test]
    fn jitter_stays_within_amplitude() {
        let now = noon_utc();
        let mut rng = StdRng::seed_from_u64(42);
        let synth = DiurnalSynthesizer::new(mst());
        for _ in 0..20 {
            for p in synth.synthesize_with(now, &mut rng) {
                let hour = p.timestamp.with_timezone(&mst()).hour();
                let base = base_load_mw(hour);
                assert!((p.historical_mw - base).abs() <= HISTORY_JITTER_MW + 0.5);
                assert_eq!(p.historical_mw, p.historical_mw.round());
            }
        }
    }

    #[test]
    fn base_curve_shape() {
        assert_eq!(base_load_mw(0), 8_800.0);
        assert_eq!(base_load_mw(5), 9_200.0);
        assert_eq!(base_load_mw(6), 9_200.0);
        assert_eq!(base_load_mw(9), 10_250.0);
        assert_eq!(base_load_mw(16), 10_400.0);
        assert_eq!(base_load_mw(20), 11_400.0);
        assert_eq!(base_load_mw(21), 11_000.0);
        assert_eq!(base_load_mw(23), 10_200.0);
    }
}
