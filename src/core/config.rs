use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::time::Duration;

use super::error::ConfigError;
use crate::api::TrackedItem;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_MARKET_URL: &str = "https://api.warframe.market/v2/";

/// Left in freshly generated configs; refusing it beats posting into the void.
const PLACEHOLDER_WEBHOOK_SUFFIX: &str = "REPLACE_WITH_ACTUAL_WEBHOOK";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub items: Vec<TrackedItem>,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: f64,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub ping_discord_ids: Vec<u64>,
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: usize,
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_seconds: f64,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_market_url")]
    pub base_url: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_true")]
    pub crossplay: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub clipboard_enabled: bool,
    #[serde(default)]
    pub sound_command: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub seen_capacity: Option<usize>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: default_market_url(),
            platform: default_platform(),
            crossplay: true,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            clipboard_enabled: true,
            sound_command: None,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            seen_capacity: None,
        }
    }
}

fn default_check_interval() -> f64 {
    1.0
}

fn default_rate_limit_requests() -> usize {
    3
}

fn default_rate_limit_window() -> f64 {
    1.0
}

fn default_market_url() -> String {
    DEFAULT_MARKET_URL.to_string()
}

fn default_platform() -> String {
    "pc".to_string()
}

fn default_request_timeout() -> f64 {
    10.0
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Loads `.env`, then the TOML file (explicit path, `WFM_CONFIG`, or
    /// `config.toml`), then `WFM__*` environment overrides, and validates.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let path = path
            .map(str::to_string)
            .or_else(|| env::var("WFM_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(true))
            .add_source(
                config::Environment::with_prefix("WFM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.items.is_empty() {
            return Err(invalid("at least one item must be configured"));
        }

        let mut slugs = HashSet::new();
        for item in &self.items {
            if item.slug.trim().is_empty() {
                return Err(invalid("item slug must not be empty"));
            }
            if !slugs.insert(item.slug.as_str()) {
                return Err(invalid(format!("item '{}' is listed twice", item.slug)));
            }
        }

        seconds("check_interval_seconds", self.check_interval_seconds, true)?;

        if self.rate_limit_requests == 0 {
            return Err(invalid("rate_limit_requests must be at least 1"));
        }

        seconds("rate_limit_window_seconds", self.rate_limit_window_seconds, false)?;

        if let Some(url) = self.webhook_url() {
            if url.ends_with(PLACEHOLDER_WEBHOOK_SUFFIX) {
                return Err(invalid("webhook_url still holds the placeholder value"));
            }
            reqwest::Url::parse(url)
                .map_err(|e| invalid(format!("webhook_url '{}' is not a valid URL: {}", url, e)))?;
        }

        reqwest::Url::parse(&self.market.base_url).map_err(|e| {
            invalid(format!(
                "market.base_url '{}' is not a valid URL: {}",
                self.market.base_url, e
            ))
        })?;

        seconds(
            "market.request_timeout_seconds",
            self.market.request_timeout_seconds,
            false,
        )?;

        if self.monitoring.seen_capacity == Some(0) {
            return Err(invalid("monitoring.seen_capacity must be at least 1 when set"));
        }

        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.check_interval_seconds)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_window_seconds)
    }

    /// `None` when no webhook is configured.
    pub fn webhook_url(&self) -> Option<&str> {
        let url = self.webhook_url.trim();
        (!url.is_empty()).then_some(url)
    }
}

impl MarketConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_seconds)
    }
}

/// Accepts only values `Duration` can represent, so the accessors never panic.
fn seconds(key: &str, value: f64, allow_zero: bool) -> Result<Duration, ConfigError> {
    let duration = Duration::try_from_secs_f64(value)
        .map_err(|e| invalid(format!("{} = {} is out of range: {}", key, value, e)))?;

    if duration.is_zero() && !allow_zero {
        return Err(invalid(format!("{} must be positive, got {}", key, value)));
    }

    Ok(duration)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}
