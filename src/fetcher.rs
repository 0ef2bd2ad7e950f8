use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::latency::LatencyStats;
use crate::config::{Config, HTTP_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::grid::status::{fallback_reading, measured_reading};
use crate::types::{AccuracyReport, LiveReading, PredictionFeed, PredictionPoint, RiskLevel};

/// Characters of an unreadable upstream body kept in the log.
const RAW_LOG_CHARS: usize = 500;

pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?)
}

// ---------------------------------------------------------------------------
// Live usage
// ---------------------------------------------------------------------------

/// Poll the live-usage upstream once. Never fails: any transport or shape
/// problem yields the fallback reading with `is_mock = true` and the cause.
pub async fn fetch_live_reading(
    client: &reqwest::Client,
    cfg: &Config,
    latency: &LatencyStats,
) -> LiveReading {
    let now = Utc::now();

    let Some(api_key) = cfg.aeso_api_key.as_deref() else {
        debug!("AESO_API_KEY not set, serving fallback reading");
        return fallback_reading(now, &cfg.thresholds, "No AESO_API_KEY configured", None);
    };

    let started = Instant::now();
    let text = request_live_usage(client, &cfg.aeso_api_url, api_key).await;
    latency.record(started.elapsed());

    let text = match text {
        Ok(t) => t,
        Err(e) => {
            warn!("AESO API error: {e}");
            return fallback_reading(now, &cfg.thresholds, e.to_string(), None);
        }
    };

    let parsed = serde_json::from_str::<Value>(&text);
    match parsed.as_ref().ok().and_then(extract_usage_mw) {
        Some(usage_mw) => measured_reading(usage_mw, now, &cfg.thresholds),
        None => {
            let raw: String = text.chars().take(RAW_LOG_CHARS).collect();
            warn!("AESO response structure not recognised: {raw}");
            fallback_reading(
                now,
                &cfg.thresholds,
                "Could not parse AESO response, check server logs",
                parsed.ok().map(|body| report_keys(&body)),
            )
        }
    }
}

/// Raw response body; parsed by the caller so unreadable payloads can be logged.
async fn request_live_usage(client: &reqwest::Client, url: &str, api_key: &str) -> Result<String> {
    let resp = client
        .get(url)
        .header("API-Key", api_key)
        .header("Accept", "application/json")
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(AppError::Upstream(format!("AESO API returned {}", resp.status())));
    }
    Ok(resp.text().await?)
}

/// Locate the Alberta internal load in a CSD payload, trying each layout the
/// API has shipped. Returns whole MW, or None when nothing positive is found.
pub fn extract_usage_mw(body: &Value) -> Option<f64> {
    let report = body.get("return").filter(|r| !r.is_null()).unwrap_or(body);

    match report.as_array() {
        Some(items) => {
            let entry = items.first()?;
            load_field(entry, "alberta_internal_load").or_else(|| load_field(entry, "totalNet"))
        }
        None => load_field(report, "alberta_internal_load")
            .or_else(|| load_field(report, "totalNet"))
            .or_else(|| report.get("summary").and_then(|s| load_field(s, "alberta_internal_load"))),
    }
}

/// A usable load figure under `key`: numeric, finite and positive once
/// rounded. Anything else lets the lookup fall through to the next layout.
fn load_field(v: &Value, key: &str) -> Option<f64> {
    v.get(key)
        .and_then(as_number)
        .map(f64::round)
        .filter(|mw| mw.is_finite() && *mw > 0.0)
}

fn report_keys(body: &Value) -> Vec<String> {
    let report = body.get("return").filter(|r| !r.is_null()).unwrap_or(body);
    report
        .as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default()
}

fn as_number(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

// ---------------------------------------------------------------------------
// Forecast and accuracy feeds
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPrediction {
    timestamp: String,
    predicted_mw: f64,
    #[serde(default)]
    lower_bound: Option<f64>,
    #[serde(default)]
    upper_bound: Option<f64>,
    #[serde(default)]
    capacity_pct: Option<f64>,
    risk_level: RiskLevel,
    #[serde(default)]
    temperature_c: Option<f64>,
}

pub async fn fetch_predictions(
    client: &reqwest::Client,
    cfg: &Config,
    latency: &LatencyStats,
) -> Result<PredictionFeed> {
    let started = Instant::now();
    let body = read_source(client, &cfg.predictions_url).await;
    latency.record(started.elapsed());

    let feed = parse_prediction_feed(&body?, cfg.local_offset)?;
    info!(
        points = feed.predictions.len(),
        source = %cfg.predictions_url,
        "Forecast feed loaded"
    );
    Ok(feed)
}

pub async fn fetch_accuracy(client: &reqwest::Client, source: &str) -> Result<AccuracyReport> {
    let body = read_source(client, source).await?;
    Ok(serde_json::from_value(body)?)
}

/// Read JSON from an `http(s)://` URL or a local file.
async fn read_source(client: &reqwest::Client, source: &str) -> Result<Value> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let resp = client.get(source).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::Upstream(format!("{source} returned {}", resp.status())));
        }
        Ok(resp.json().await?)
    } else {
        let text = tokio::fs::read_to_string(source).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Parse `{generated_at?, predictions: [...]}` and enforce the feed invariants:
/// strictly increasing timestamps, and bounds that are paired and bracket the
/// prediction. Offending entries are dropped or have their bounds cleared.
pub fn parse_prediction_feed(body: &Value, offset: FixedOffset) -> Result<PredictionFeed> {
    if !body.is_object() {
        return Err(AppError::Parse("prediction feed is not a JSON object".to_string()));
    }

    let generated_at = body
        .get("generated_at")
        .and_then(|g| g.as_str())
        .map(|s| s.to_string());

    let entries = match body.get("predictions") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => return Err(AppError::Parse("`predictions` is not an array".to_string())),
    };

    let mut predictions: Vec<PredictionPoint> = Vec::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        let raw: RawPrediction = match serde_json::from_value(entry) {
            Ok(r) => r,
            Err(e) => {
                warn!(entry = i, "Dropping malformed prediction: {e}");
                continue;
            }
        };

        let Some(timestamp) = parse_timestamp(&raw.timestamp, offset) else {
            warn!(entry = i, timestamp = %raw.timestamp, "Dropping prediction with unreadable timestamp");
            continue;
        };
        if let Some(prev) = predictions.last() {
            if timestamp <= prev.timestamp {
                warn!(entry = i, timestamp = %raw.timestamp, "Dropping out-of-order prediction");
                continue;
            }
        }

        let (lower_bound, upper_bound) = match (raw.lower_bound, raw.upper_bound) {
            (None, None) => (None, None),
            (Some(lo), Some(hi)) if lo <= raw.predicted_mw && raw.predicted_mw <= hi => {
                (Some(lo), Some(hi))
            }
            (lo, hi) => {
                warn!(
                    entry = i,
                    lower = ?lo,
                    upper = ?hi,
                    predicted = raw.predicted_mw,
                    "Clearing inconsistent confidence bounds"
                );
                (None, None)
            }
        };

        predictions.push(PredictionPoint {
            timestamp,
            predicted_mw: raw.predicted_mw,
            lower_bound,
            upper_bound,
            capacity_pct: raw.capacity_pct,
            risk_level: raw.risk_level,
            temperature_c: raw.temperature_c,
        });
    }

    Ok(PredictionFeed { generated_at, predictions })
}

/// RFC 3339, or a naive local timestamp read in `offset`.
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GridStatus;
    use serde_json::json;

    fn mst() -> FixedOffset {
        FixedOffset::east_opt(-7 * 3600).unwrap()
    }

    fn cfg_with(url: String, key: Option<&str>) -> Config {
        Config {
            aeso_api_url: url,
            aeso_api_key: key.map(|k| k.to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn extracts_each_known_layout() {
        assert_eq!(extract_usage_mw(&json!({"return": {"alberta_internal_load": 10234.6}})), Some(10235.0));
        assert_eq!(extract_usage_mw(&json!({"totalNet": "9876.2"})), Some(9876.0));
        assert_eq!(
            extract_usage_mw(&json!({"return": {"summary": {"alberta_internal_load": "10001"}}})),
            Some(10001.0)
        );
        assert_eq!(extract_usage_mw(&json!({"return": [{"totalNet": 9500}]})), Some(9500.0));
    }

    #[test]
    fn zero_load_falls_through_to_next_field() {
        assert_eq!(
            extract_usage_mw(&json!({"return": {"alberta_internal_load": 0, "totalNet": 9_750}})),
            Some(9_750.0)
        );
        assert_eq!(
            extract_usage_mw(&json!({"alberta_internal_load": "0", "summary": {"alberta_internal_load": 10_100}})),
            Some(10_100.0)
        );
        assert_eq!(
            extract_usage_mw(&json!({"return": [{"alberta_internal_load": -5, "totalNet": "9900.6"}]})),
            Some(9_901.0)
        );
    }

    #[test]
    fn rejects_missing_zero_or_garbage_usage() {
        assert_eq!(extract_usage_mw(&json!({"return": {"something_else": 1}})), None);
        assert_eq!(extract_usage_mw(&json!({"alberta_internal_load": 0})), None);
        assert_eq!(extract_usage_mw(&json!({"alberta_internal_load": "n/a"})), None);
        assert_eq!(extract_usage_mw(&json!({"return": []})), None);
    }

    #[tokio::test]
    async fn live_reading_from_upstream() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/csd")
            .match_header("API-Key", "secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"return": {"alberta_internal_load": "11600.4"}}).to_string())
            .create_async()
            .await;

        let cfg = cfg_with(format!("{}/csd", server.url()), Some("secret"));
        let latency = LatencyStats::new();
        let reading = fetch_live_reading(&http_client().unwrap(), &cfg, &latency).await;

        mock.assert_async().await;
        assert!(!reading.is_mock);
        assert_eq!(reading.usage_mw, 11600.0);
        assert_eq!(reading.capacity_percent, 99);
        assert_eq!(reading.status, GridStatus::Critical);
        assert!(reading.error.is_none());
        assert_eq!(latency.len(), 1);
    }

    #[tokio::test]
    async fn missing_key_yields_mock_without_request() {
        let cfg = cfg_with("http://127.0.0.1:9/unreachable".to_string(), None);
        let latency = LatencyStats::new();
        let reading = fetch_live_reading(&http_client().unwrap(), &cfg, &latency).await;

        assert!(reading.is_mock);
        assert_eq!(reading.usage_mw, 10_500.0);
        assert_eq!(reading.status, GridStatus::Stable);
        assert_eq!(latency.len(), 0);
    }

    #[tokio::test]
    async fn upstream_error_status_yields_mock() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/csd").with_status(503).create_async().await;

        let cfg = cfg_with(format!("{}/csd", server.url()), Some("k"));
        let reading = fetch_live_reading(&http_client().unwrap(), &cfg, &LatencyStats::new()).await;

        assert!(reading.is_mock);
        assert_eq!(reading.status, GridStatus::Stable);
        assert!(reading.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn unreachable_upstream_yields_mock() {
        let cfg = cfg_with("http://127.0.0.1:9/csd".to_string(), Some("k"));
        let reading = fetch_live_reading(&http_client().unwrap(), &cfg, &LatencyStats::new()).await;

        assert!(reading.is_mock);
        assert_eq!(reading.usage_mw, 10_500.0);
        assert_eq!(reading.capacity_percent, 90);
    }

    #[tokio::test]
    async fn unrecognised_shape_yields_mock_with_keys() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/csd")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"return": {"generation": 1, "interchange": 2}}).to_string())
            .create_async()
            .await;

        let cfg = cfg_with(format!("{}/csd", server.url()), Some("k"));
        let reading = fetch_live_reading(&http_client().unwrap(), &cfg, &LatencyStats::new()).await;

        assert!(reading.is_mock);
        let mut keys = reading.raw_keys.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["generation".to_string(), "interchange".to_string()]);
    }

    #[tokio::test]
    async fn non_json_body_yields_mock_without_keys() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/csd")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html>maintenance window</html>")
            .create_async()
            .await;

        let cfg = cfg_with(format!("{}/csd", server.url()), Some("k"));
        let reading = fetch_live_reading(&http_client().unwrap(), &cfg, &LatencyStats::new()).await;

        assert!(reading.is_mock);
        assert_eq!(reading.usage_mw, 10_500.0);
        assert_eq!(reading.error.as_deref(), Some("Could not parse AESO response, check server logs"));
        assert!(reading.raw_keys.is_none());
    }

    #[test]
    fn parses_naive_and_rfc3339_timestamps() {
        let naive = parse_timestamp("2026-02-20T17:00:00", mst()).unwrap();
        assert_eq!(naive.to_rfc3339(), "2026-02-21T00:00:00+00:00");
        let rfc = parse_timestamp("2026-02-20T17:00:00-07:00", mst()).unwrap();
        assert_eq!(rfc, naive);
        assert!(parse_timestamp("yesterday", mst()).is_none());
    }

    #[test]
    fn feed_sanitation() {
        let body = json!({
            "generated_at": "2026-02-20T16:05:00",
            "predictions": [
                {"timestamp": "2026-02-20T17:00:00", "predicted_mw": 10100, "lower_bound": 9800, "upper_bound": 10400, "capacity_pct": 86.3, "risk_level": "safe", "temperature_c": -12.5},
                {"timestamp": "2026-02-20T17:00:00", "predicted_mw": 10200, "risk_level": "safe"},
                {"timestamp": "2026-02-20T18:00:00", "predicted_mw": 10600, "lower_bound": 10300, "risk_level": "warning"},
                {"timestamp": "2026-02-20T19:00:00", "predicted_mw": 10700, "lower_bound": 10900, "upper_bound": 10800, "risk_level": "warning"},
                {"timestamp": "not a time", "predicted_mw": 1, "risk_level": "safe"},
                {"timestamp": "2026-02-20T20:00:00", "predicted_mw": 11600, "risk_level": "extreme"},
                {"timestamp": "2026-02-20T21:00:00", "predicted_mw": 11600, "risk_level": "critical"}
            ]
        });
        let feed = parse_prediction_feed(&body, mst()).unwrap();

        assert_eq!(feed.generated_at.as_deref(), Some("2026-02-20T16:05:00"));
        assert_eq!(feed.predictions.len(), 4);
        assert_eq!(feed.predictions[0].lower_bound, Some(9800.0));
        assert_eq!(feed.predictions[0].temperature_c, Some(-12.5));
        // Lone lower bound is cleared.
        assert_eq!(feed.predictions[1].lower_bound, None);
        // Inverted bounds are cleared.
        assert_eq!(feed.predictions[2].upper_bound, None);
        assert_eq!(feed.predictions[3].risk_level, RiskLevel::Critical);
        for pair in feed.predictions.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }

    #[test]
    fn missing_predictions_array_is_empty_feed() {
        let feed = parse_prediction_feed(&json!({}), mst()).unwrap();
        assert!(feed.predictions.is_empty());
        assert!(parse_prediction_feed(&json!([1, 2]), mst()).is_err());
        assert!(parse_prediction_feed(&json!({"predictions": "nope"}), mst()).is_err());
    }

    #[tokio::test]
    async fn predictions_from_http_source() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/predictions.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"predictions": [
                    {"timestamp": "2026-02-20T17:00:00-07:00", "predicted_mw": 10100, "risk_level": "safe"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let cfg = Config {
            predictions_url: format!("{}/predictions.json", server.url()),
            ..Config::default()
        };
        let feed = fetch_predictions(&http_client().unwrap(), &cfg, &LatencyStats::new())
            .await
            .unwrap();
        assert_eq!(feed.predictions.len(), 1);
    }

    #[tokio::test]
    async fn predictions_from_file_source() {
        let path = std::env::temp_dir().join(format!("gridsync-predictions-{}.json", std::process::id()));
        tokio::fs::write(
            &path,
            json!({"predictions": [
                {"timestamp": "2026-02-20T17:00:00", "predicted_mw": 10100, "lower_bound": 9900, "upper_bound": 10300, "risk_level": "warning"},
                {"timestamp": "2026-02-20T18:00:00", "predicted_mw": 10150, "risk_level": "safe"}
            ]})
            .to_string(),
        )
        .await
        .unwrap();

        let cfg = Config { predictions_url: path.display().to_string(), ..Config::default() };
        let feed = fetch_predictions(&http_client().unwrap(), &cfg, &LatencyStats::new()).await;
        let _ = tokio::fs::remove_file(&path).await;

        let feed = feed.unwrap();
        assert_eq!(feed.predictions.len(), 2);
        assert_eq!(feed.predictions[0].risk_level, RiskLevel::Warning);
    }

    #[tokio::test]
    async fn missing_prediction_file_is_an_error() {
        let cfg = Config {
            predictions_url: "/nonexistent/gridsync/predictions.json".to_string(),
            ..Config::default()
        };
        let res = fetch_predictions(&http_client().unwrap(), &cfg, &LatencyStats::new()).await;
        assert!(matches!(res, Err(AppError::Io(_))));
    }

    #[tokio::test]
    async fn accuracy_feed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/accuracy.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "mae_mw": 234.0,
                    "accuracy_200mw": 55.2,
                    "accuracy_500mw": 91.0,
                    "trained_at": "2026-02-19T03:00:00",
                    "has_temperature": true
                })
                .to_string(),
            )
            .create_async()
            .await;

        let report = fetch_accuracy(&http_client().unwrap(), &format!("{}/accuracy.json", server.url()))
            .await
            .unwrap();
        assert!(report.has_temperature);
        assert!((report.headline_accuracy_pct(11_700.0) - 98.0).abs() < 1e-9);
    }
}
