mod api;
mod config;
mod error;
mod fetcher;
mod grid;
mod poller;
mod scheduler;
mod state;
mod types;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::http_client;
use crate::grid::{DiurnalSynthesizer, HistorySource};
use crate::poller::{ForecastPoller, LivePoller};
use crate::scheduler::{PeriodicTask, Schedule};
use crate::state::GridStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    info!(
        "GridSync starting: capacity={:.0} MW, warning>{:.0} MW, critical>{:.0} MW, horizon={}",
        cfg.thresholds.max_capacity_mw,
        cfg.thresholds.warning_threshold_mw,
        cfg.thresholds.critical_threshold_mw,
        cfg.forecast_horizon,
    );
    if cfg.aeso_api_key.is_none() {
        warn!("AESO_API_KEY not set; live usage will be served as demo data (is_mock=true).");
    }
    if cfg.accuracy_url.is_none() {
        info!("ACCURACY_URL not set; /api/accuracy will report unavailable.");
    }

    let client = http_client()?;
    let history: Arc<dyn HistorySource> = Arc::new(DiurnalSynthesizer::new(cfg.local_offset));
    let store = GridStore::new(cfg.thresholds, cfg.forecast_horizon, cfg.local_offset, history);
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());

    let shutdown = CancellationToken::new();

    // --- Pollers ---

    // Live usage (every LIVE_POLL_SECS)
    let live = Arc::new(LivePoller::new(
        client.clone(),
        cfg.clone(),
        Arc::clone(&store),
        Arc::clone(&health),
        Arc::clone(&latency),
    ));
    let live_task = PeriodicTask::spawn(
        "live-usage",
        Schedule::from_secs(cfg.live_poll_secs),
        shutdown.child_token(),
        move || {
            let live = Arc::clone(&live);
            async move { live.tick().await }
        },
    );

    // Forecast + accuracy (once, or every FORECAST_REFRESH_SECS)
    let forecast = Arc::new(ForecastPoller::new(
        client.clone(),
        cfg.clone(),
        Arc::clone(&store),
        Arc::clone(&health),
        Arc::clone(&latency),
    ));
    let forecast_task = PeriodicTask::spawn(
        "forecast",
        Schedule::from_secs(cfg.forecast_refresh_secs),
        shutdown.child_token(),
        move || {
            let forecast = Arc::clone(&forecast);
            async move { forecast.tick().await }
        },
    );

    // --- HTTP API server ---
    let app = router(ApiState { store, health, latency });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {e}");
            return;
        }
        info!("Shutdown signal received");
        signal.cancel();
    });

    let server_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await?;

    shutdown.cancel();
    for task in [live_task, forecast_task] {
        let name = task.name();
        task.cancel();
        task.join().await;
        info!(task = name, "Stopped");
    }

    Ok(())
}
