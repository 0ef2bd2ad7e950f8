use chrono::{FixedOffset, Offset, Utc};

use crate::error::{AppError, Result};

pub const AESO_API_URL: &str =
    "https://apimgw.aeso.ca/public/currentsupplydemand-api/v2/csd/summary/current";
pub const PREDICTIONS_URL: &str = "predictions.json";

/// Alberta grid ceiling used for capacity percent and accuracy headline.
pub const MAX_CAPACITY_MW: f64 = 11_700.0;

/// Absolute MW cutoffs. Fixed levels, not recomputed from capacity percent.
pub const WARNING_THRESHOLD_MW: f64 = 10_500.0;
pub const CRITICAL_THRESHOLD_MW: f64 = 11_500.0;

/// Usage reported whenever the live upstream cannot be read.
pub const FALLBACK_USAGE_MW: f64 = 10_500.0;

/// Live reading poll interval (seconds).
pub const LIVE_POLL_SECS: u64 = 60;

/// Number of forecast entries the stitcher keeps.
pub const FORECAST_HORIZON: usize = 48;

/// Length of the trailing history window, in hourly samples.
pub const HISTORY_HOURS: u32 = 24;

/// Half-width of the uniform jitter applied to synthesized history.
pub const HISTORY_JITTER_MW: f64 = 150.0;

/// Upstream request timeout (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Alberta standard time.
pub const LOCAL_UTC_OFFSET_HOURS: i32 = -7;

/// Immutable grid limits handed to the classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridThresholds {
    pub max_capacity_mw: f64,
    pub warning_threshold_mw: f64,
    pub critical_threshold_mw: f64,
}

impl Default for GridThresholds {
    fn default() -> Self {
        Self {
            max_capacity_mw: MAX_CAPACITY_MW,
            warning_threshold_mw: WARNING_THRESHOLD_MW,
            critical_threshold_mw: CRITICAL_THRESHOLD_MW,
        }
    }
}

impl GridThresholds {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_capacity_mw > 0.0) {
            return Err(AppError::Config("MAX_CAPACITY_MW must be positive".to_string()));
        }
        if !(self.warning_threshold_mw > 0.0) {
            return Err(AppError::Config("WARNING_THRESHOLD_MW must be positive".to_string()));
        }
        if self.warning_threshold_mw >= self.critical_threshold_mw {
            return Err(AppError::Config(
                "WARNING_THRESHOLD_MW must be below CRITICAL_THRESHOLD_MW".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    /// Credential for the live upstream (AESO_API_KEY). None means every poll is mocked.
    pub aeso_api_key: Option<String>,
    pub aeso_api_url: String,
    /// URL or local path of the forecast feed (PREDICTIONS_URL)
    pub predictions_url: String,
    /// URL or local path of the accuracy feed (ACCURACY_URL)
    pub accuracy_url: Option<String>,
    pub thresholds: GridThresholds,
    pub live_poll_secs: u64,
    /// 0 = fetch the forecast once at startup (FORECAST_REFRESH_SECS)
    pub forecast_refresh_secs: u64,
    pub forecast_horizon: usize,
    /// Offset used for hour-of-day and display labels (LOCAL_UTC_OFFSET_HOURS)
    pub local_offset: FixedOffset,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let thresholds = GridThresholds {
            max_capacity_mw: env_parse("MAX_CAPACITY_MW", MAX_CAPACITY_MW)?,
            warning_threshold_mw: env_parse("WARNING_THRESHOLD_MW", WARNING_THRESHOLD_MW)?,
            critical_threshold_mw: env_parse("CRITICAL_THRESHOLD_MW", CRITICAL_THRESHOLD_MW)?,
        };
        thresholds.validate()?;

        let offset_hours: i32 = env_parse("LOCAL_UTC_OFFSET_HOURS", LOCAL_UTC_OFFSET_HOURS)?;
        let local_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            AppError::Config("LOCAL_UTC_OFFSET_HOURS must be within ±23".to_string())
        })?;

        let live_poll_secs: u64 = env_parse("LIVE_POLL_SECS", LIVE_POLL_SECS)?;
        if live_poll_secs == 0 {
            return Err(AppError::Config("LIVE_POLL_SECS must be at least 1".to_string()));
        }

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            aeso_api_key: std::env::var("AESO_API_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            aeso_api_url: std::env::var("AESO_API_URL")
                .unwrap_or_else(|_| AESO_API_URL.to_string()),
            predictions_url: std::env::var("PREDICTIONS_URL")
                .unwrap_or_else(|_| PREDICTIONS_URL.to_string()),
            accuracy_url: std::env::var("ACCURACY_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            thresholds,
            live_poll_secs,
            forecast_refresh_secs: env_parse("FORECAST_REFRESH_SECS", 0)?,
            forecast_horizon: env_parse("FORECAST_HORIZON", FORECAST_HORIZON)?,
            local_offset,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            api_port: 3000,
            aeso_api_key: None,
            aeso_api_url: AESO_API_URL.to_string(),
            predictions_url: PREDICTIONS_URL.to_string(),
            accuracy_url: None,
            thresholds: GridThresholds::default(),
            live_poll_secs: LIVE_POLL_SECS,
            forecast_refresh_secs: 0,
            forecast_horizon: FORECAST_HORIZON,
            local_offset: alberta_offset(),
        }
    }
}

fn alberta_offset() -> FixedOffset {
    FixedOffset::east_opt(LOCAL_UTC_OFFSET_HOURS * 3600).unwrap_or_else(|| Utc.fix())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        _ => Ok(default),
    }
}
