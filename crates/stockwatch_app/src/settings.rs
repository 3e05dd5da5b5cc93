use std::path::PathBuf;
use std::time::Duration;

use log::LevelFilter;
use stockwatch_engine::{DEFAULT_MAX_CONCURRENCY, DEFAULT_SMTP_HOST, DEFAULT_THROTTLE_FILE};

use crate::logging::LogDestination;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Process-level settings, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub config_path: PathBuf,
    pub throttle_path: PathBuf,
    pub proxy_prefix: Option<String>,
    pub max_concurrency: usize,
    pub retry_delay: Duration,
    pub smtp_host: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub log_destination: LogDestination,
    pub log_level: LevelFilter,
}

impl AppSettings {
    pub fn from_env(config_arg: Option<String>) -> Self {
        Self::from_lookup(config_arg, |key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source. Unparsable numbers
    /// fall back to their defaults.
    pub fn from_lookup(config_arg: Option<String>, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config_path = config_arg
            .filter(|arg| !arg.trim().is_empty())
            .or_else(|| var("STOCKWATCH_CONFIG"))
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
        let throttle_path =
            var("STOCKWATCH_THROTTLE_FILE").unwrap_or_else(|| DEFAULT_THROTTLE_FILE.to_string());
        let max_concurrency = var("STOCKWATCH_MAX_CONCURRENCY")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONCURRENCY);
        let retry_delay = var("STOCKWATCH_RETRY_DELAY_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(1));
        let log_destination = var("STOCKWATCH_LOG")
            .and_then(|v| LogDestination::parse(&v))
            .unwrap_or(LogDestination::Terminal);
        let log_level = var("STOCKWATCH_LOG_LEVEL")
            .and_then(|v| v.parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::Info);

        Self {
            config_path: PathBuf::from(config_path),
            throttle_path: PathBuf::from(throttle_path),
            proxy_prefix: var("STOCKWATCH_PROXY_PREFIX"),
            max_concurrency,
            retry_delay,
            smtp_host: var("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            smtp_user: var("SMTP_USER"),
            smtp_password: var("SMTP_PASSWORD"),
            log_destination,
            log_level,
        }
    }
}
