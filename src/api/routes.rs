use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::state::{GridStore, GridView};
use crate::types::{AccuracyReport, LiveReading, PredictionPoint, TimelinePoint};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<GridStore>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/live-usage", get(get_live_usage))
        .route("/api/predictions", get(get_predictions))
        .route("/api/timeline", get(get_timeline))
        .route("/api/grid-status", get(get_grid_status))
        .route("/api/accuracy", get(get_accuracy))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct PredictionsResponse {
    pub generated_at: Option<String>,
    pub available: bool,
    pub predictions: Vec<PredictionPoint>,
}

#[derive(Serialize)]
pub struct AccuracyResponse {
    pub available: bool,
    #[serde(flatten)]
    pub report: Option<AccuracyReport>,
    pub headline_accuracy_pct: Option<f64>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub live_polls: u64,
    pub last_live_poll_at: Option<DateTime<Utc>>,
    pub live_is_mock: bool,
    pub last_forecast_at: Option<DateTime<Utc>>,
    pub forecast_fetched_at: Option<DateTime<Utc>>,
    pub forecast_available: bool,
    pub forecast_points: usize,
    pub forecast_failures: u64,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub sample_count: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Always 200. Callers branch on `is_mock`, never on transport status.
async fn get_live_usage(State(state): State<ApiState>) -> Json<LiveReading> {
    Json(state.store.live())
}

async fn get_predictions(State(state): State<ApiState>) -> Json<PredictionsResponse> {
    let snapshot = state.store.forecast();
    let horizon = state.store.horizon();
    Json(PredictionsResponse {
        generated_at: snapshot.feed.generated_at,
        available: snapshot.available,
        predictions: snapshot.feed.predictions.into_iter().take(horizon).collect(),
    })
}

async fn get_timeline(State(state): State<ApiState>) -> Json<Vec<TimelinePoint>> {
    Json(state.store.timeline(Utc::now()))
}

async fn get_grid_status(State(state): State<ApiState>) -> Json<GridView> {
    Json(state.store.view(Utc::now()))
}

async fn get_accuracy(State(state): State<ApiState>) -> Json<AccuracyResponse> {
    let report = state.store.accuracy();
    let max_capacity = state.store.thresholds().max_capacity_mw;
    Json(AccuracyResponse {
        available: report.is_some(),
        headline_accuracy_pct: report
            .as_ref()
            .map(|r| (r.headline_accuracy_pct(max_capacity) * 10.0).round() / 10.0),
        report,
    })
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let snapshot = state.store.forecast();
    Json(HealthResponse {
        live_polls: state.health.live_polls(),
        last_live_poll_at: millis_to_utc(state.health.last_live_poll_ms()),
        live_is_mock: state.health.live_is_mock(),
        last_forecast_at: millis_to_utc(state.health.last_forecast_ms()),
        forecast_fetched_at: snapshot.fetched_at,
        forecast_available: snapshot.available,
        forecast_points: snapshot.feed.predictions.len(),
        forecast_failures: state.health.forecast_failures(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let (p50, p95, p99) = state.latency.percentiles();
    let to_ms = |us: Option<u64>| us.map(|v| v as f64 / 1_000.0);
    Json(LatencyResponse {
        p50_ms: to_ms(p50),
        p95_ms: to_ms(p95),
        p99_ms: to_ms(p99),
        sample_count: state.latency.len(),
    })
}

fn millis_to_utc(ms: u64) -> Option<DateTime<Utc>> {
    if ms == 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms as i64).single()
}
