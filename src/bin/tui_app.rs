use chrono::{DateTime, Utc};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct LiveUsageResponse {
    pub usage_mw: f64,
    pub capacity_percent: u32,
    pub last_updated: DateTime<Utc>,
    pub status: String,
    pub is_mock: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskWindowResponse {
    pub timestamp: DateTime<Utc>,
    pub risk_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct TimelinePointResponse {
    pub index: usize,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub historical_mw: Option<f64>,
    pub predicted_mw: Option<f64>,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    pub confidence_width: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct GridStatusResponse {
    pub live: LiveUsageResponse,
    pub max_capacity_mw: f64,
    pub warning_threshold_mw: f64,
    pub critical_threshold_mw: f64,
    pub status: String,
    pub next_risk_window: Option<RiskWindowResponse>,
    pub countdown_message: String,
    pub forecast_available: bool,
    pub timeline: Vec<TimelinePointResponse>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct HealthResponse {
    pub live_polls: Option<u64>,
    pub live_is_mock: Option<bool>,
    pub forecast_points: Option<usize>,
    pub forecast_failures: Option<u64>,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub grid: Option<GridStatusResponse>,
    pub health: HealthResponse,
    pub last_refresh: std::time::Instant,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            grid: None,
            health: HealthResponse::default(),
            last_refresh: std::time::Instant::now(),
            base_url,
        }
    }

    pub fn timeline_len(&self) -> usize {
        self.grid.as_ref().map_or(0, |g| g.timeline.len())
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let grid_url = format!("{}/api/grid-status", self.base_url);
        let health_url = format!("{}/health", self.base_url);

        let (grid_res, health_res) = tokio::join!(
            client.get(&grid_url).send(),
            client.get(&health_url).send(),
        );

        let grid_resp = match grid_res {
            Ok(r) => r,
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };

        match grid_resp.json::<GridStatusResponse>().await {
            Ok(grid) => {
                self.grid = Some(grid);
                self.status = ConnectionStatus::Connected;
                self.last_refresh = std::time::Instant::now();

                if let Ok(h) = health_res {
                    if let Ok(health) = h.json::<HealthResponse>().await {
                        self.health = health;
                    }
                }
            }
            Err(e) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Whole megawatts with thousands separators: `10,500`.
pub fn format_mw(mw: f64) -> String {
    let rounded = mw.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0 {
        out.insert(0, '-');
    }
    out
}

pub fn format_opt_mw(mw: Option<f64>) -> String {
    mw.map_or("—".to_string(), format_mw)
}

/// Band as `lower–upper`, or a dash when the point has no bounds.
pub fn format_band(lower: Option<f64>, upper: Option<f64>) -> String {
    match (lower, upper) {
        (Some(lo), Some(hi)) => format!("{}–{}", format_mw(lo), format_mw(hi)),
        _ => "—".to_string(),
    }
}

/// Countdown re-derived against the local clock so it ticks between refreshes.
pub fn live_countdown(window: Option<&RiskWindowResponse>, now: DateTime<Utc>) -> Option<String> {
    let window = window?;
    let diff_ms = (window.timestamp - now).num_milliseconds();
    if diff_ms <= 0 {
        return None;
    }
    let kind = if window.risk_level == "critical" { "critical" } else { "elevated" };
    let hours = diff_ms / 3_600_000;
    let mins = (diff_ms % 3_600_000) / 60_000;
    let secs = (diff_ms % 60_000) / 1_000;
    Some(format!("Next {kind} period in {hours}h {mins}m {secs}s"))
}

/// Horizontal bar scaled to `max_mw`, `width` cells wide.
pub fn load_bar(mw: f64, max_mw: f64, width: usize) -> String {
    if max_mw <= 0.0 {
        return String::new();
    }
    let filled = ((mw / max_mw) * width as f64).round().clamp(0.0, width as f64) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Severity of a load value against the server's configured cutoffs.
pub fn load_severity(mw: f64, grid: &GridStatusResponse) -> &'static str {
    if mw > grid.critical_threshold_mw {
        "CRITICAL"
    } else if mw > grid.warning_threshold_mw {
        "WARNING"
    } else {
        "STABLE"
    }
}

pub fn status_label(status: &str) -> &'static str {
    match status {
        "CRITICAL" => "CRITICAL",
        "WARNING" => "ELEVATED",
        _ => "STABLE",
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn mw_formatting() {
        assert_eq!(format_mw(10_500.0), "10,500");
        assert_eq!(format_mw(999.4), "999");
        assert_eq!(format_mw(1_234_567.0), "1,234,567");
        assert_eq!(format_band(Some(9_800.0), Some(10_250.0)), "9,800–10,250");
        assert_eq!(format_band(Some(9_800.0), None), "—");
    }

    #[test]
    fn load_bar_scales_and_clamps() {
        assert_eq!(load_bar(5_850.0, 11_700.0, 10), "█████░░░░░");
        assert_eq!(load_bar(20_000.0, 11_700.0, 4), "████");
        assert_eq!(load_bar(1_000.0, 0.0, 4), "");
    }

    #[test]
    fn severity_uses_served_thresholds() {
        let grid: GridStatusResponse = serde_json::from_value(serde_json::json!({
            "live": {
                "usage_mw": 9_000.0,
                "capacity_percent": 90,
                "last_updated": "2026-02-20T19:00:00Z",
                "status": "STABLE",
                "is_mock": false
            },
            "max_capacity_mw": 10_000.0,
            "warning_threshold_mw": 8_000.0,
            "critical_threshold_mw": 9_500.0,
            "status": "WARNING",
            "next_risk_window": null,
            "countdown_message": "No risk periods ahead",
            "forecast_available": false,
            "timeline": []
        }))
        .unwrap();

        assert_eq!(load_severity(7_900.0, &grid), "STABLE");
        assert_eq!(load_severity(9_000.0, &grid), "WARNING");
        assert_eq!(load_severity(9_600.0, &grid), "CRITICAL");
    }

    #[test]
    fn local_countdown_ticks_down() {
        let now = Utc.with_ymd_and_hms(2026, 2, 20, 12, 0, 0).unwrap();
        let window = RiskWindowResponse {
            timestamp: now + Duration::milliseconds(3_661_000),
            risk_level: "warning".to_string(),
        };
        assert_eq!(
            live_countdown(Some(&window), now).as_deref(),
            Some("Next elevated period in 1h 1m 1s")
        );
        assert!(live_countdown(Some(&window), now + Duration::hours(2)).is_none());
        assert!(live_countdown(None, now).is_none());
    }
}
