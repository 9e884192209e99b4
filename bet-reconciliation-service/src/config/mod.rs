//! Configuration module for bet-reconciliation-service.

use service_core::config as core_config;
use service_core::error::AppError;
use service_core::retry::RetryConfig;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub mongodb: MongoConfig,
    pub collections: Collections,
    pub schedule: MatchingSchedule,
    pub store_retry: RetryConfig,
    /// Repeat the reconciliation cycle this often; `None` runs it once.
    pub run_interval: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

/// Names of the store collections the engine reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct Collections {
    pub exchange: String,
    pub bookie: String,
    pub matched_events: String,
    pub account_transfers: String,
    pub open_exchange_bets: String,
    pub open_bookie_bets: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            exchange: "betfair-statement".to_string(),
            bookie: "bookie-statement".to_string(),
            matched_events: "matchedEvents".to_string(),
            account_transfers: "account-transfers".to_string(),
            open_exchange_bets: "latest-betfair-bets".to_string(),
            open_bookie_bets: "latest-bookie-bets".to_string(),
        }
    }
}

/// Confidence thresholds (percent) and time windows (hours) tried when a
/// caller does not supply its own.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingSchedule {
    pub confidence_levels: Vec<f64>,
    pub time_windows: Vec<f64>,
}

impl Default for MatchingSchedule {
    fn default() -> Self {
        Self {
            confidence_levels: vec![95.0, 75.0, 40.0],
            time_windows: vec![24.0, 36.0, 48.0],
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            service_name: "bet-reconciliation-service".to_string(),
            mongodb: MongoConfig {
                uri: "mongodb://localhost:27017".to_string(),
                database: "reconciliation_db".to_string(),
            },
            collections: Collections::default(),
            schedule: MatchingSchedule::default(),
            store_retry: RetryConfig::default(),
            run_interval: None,
        }
    }
}

impl ReconciliationConfig {
    pub fn from_env() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";
        let defaults = Self::default();

        let mut store_retry = RetryConfig::default();
        if let Some(max_retries) = parse_env::<u32>("STORE_MAX_RETRIES")? {
            store_retry.max_retries = max_retries;
        }
        if let Some(initial_ms) = parse_env::<u64>("STORE_INITIAL_BACKOFF_MS")? {
            store_retry.initial_backoff = Duration::from_millis(initial_ms);
        }

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or(defaults.service_name),
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some(defaults.mongodb.uri.as_str()), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some(defaults.mongodb.database.as_str()), false)?,
            },
            collections: Collections {
                exchange: env::var("EXCHANGE_COLLECTION").unwrap_or(defaults.collections.exchange),
                bookie: env::var("BOOKIE_COLLECTION").unwrap_or(defaults.collections.bookie),
                matched_events: env::var("MATCHED_EVENTS_COLLECTION")
                    .unwrap_or(defaults.collections.matched_events),
                account_transfers: env::var("ACCOUNT_TRANSFERS_COLLECTION")
                    .unwrap_or(defaults.collections.account_transfers),
                open_exchange_bets: env::var("OPEN_EXCHANGE_BETS_COLLECTION")
                    .unwrap_or(defaults.collections.open_exchange_bets),
                open_bookie_bets: env::var("OPEN_BOOKIE_BETS_COLLECTION")
                    .unwrap_or(defaults.collections.open_bookie_bets),
            },
            schedule: MatchingSchedule {
                confidence_levels: match env::var("MATCH_CONFIDENCE_LEVELS") {
                    Ok(raw) => parse_list("MATCH_CONFIDENCE_LEVELS", &raw)?,
                    Err(_) => defaults.schedule.confidence_levels,
                },
                time_windows: match env::var("MATCH_TIME_WINDOWS") {
                    Ok(raw) => parse_list("MATCH_TIME_WINDOWS", &raw)?,
                    Err(_) => defaults.schedule.time_windows,
                },
            },
            store_retry,
            run_interval: parse_env::<u64>("RUN_INTERVAL_SECS")?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, AppError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}'", key, raw))
        }),
        Err(_) => Ok(None),
    }
}

/// Comma separated numbers, e.g. `95,75,40`.
fn parse_list(key: &str, raw: &str) -> Result<Vec<f64>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>().map_err(|_| {
                AppError::ConfigError(anyhow::anyhow!("{} has an invalid entry '{}'", key, s))
            })
        })
        .collect()
}
