use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_COOLDOWN_SECONDS: u64 = 1800;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("element path is empty")]
    EmptyElementPath,
    #[error("element path entry {index} is blank")]
    BlankSelector { index: usize },
    #[error("maxRetries must be at least 1")]
    ZeroRetries,
    #[error("timeout must be at least 1 second")]
    ZeroTimeout,
    #[error("page url {url:?} is not a valid absolute url: {reason}")]
    InvalidPageUrl { url: String, reason: String },
    #[error("target needs a proxy but no proxy prefix is configured")]
    ProxyPrefixMissing,
}

/// One monitored page and the marker it is watched for.
///
/// Field names on disk follow the established config file layout
/// (`website`, `name`, `pic`, `url`, `elementTypes`, ...); snake_case names
/// are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(rename = "website", alias = "site")]
    pub site: String,
    #[serde(rename = "name", alias = "label")]
    pub label: String,
    #[serde(rename = "pic", alias = "image_url", default)]
    pub image_url: String,
    #[serde(rename = "url", alias = "page_url")]
    pub page_url: String,
    #[serde(rename = "elementTypes", alias = "element_path")]
    pub element_path: Vec<String>,
    #[serde(rename = "monitorText", alias = "monitor_text")]
    pub monitor_text: String,
    #[serde(rename = "emails", alias = "recipients", default)]
    pub recipients: Vec<String>,
    #[serde(rename = "needProxy", alias = "use_proxy", default)]
    pub use_proxy: bool,
    #[serde(
        rename = "noticeSeconds",
        alias = "cooldown_seconds",
        default = "default_cooldown_seconds"
    )]
    pub cooldown_seconds: u64,
    #[serde(
        rename = "timeout",
        alias = "timeout_seconds",
        default = "default_timeout_seconds"
    )]
    pub timeout_seconds: u64,
    #[serde(
        rename = "maxRetries",
        alias = "max_retries",
        default = "default_max_retries"
    )]
    pub max_retries: u32,
}

fn default_cooldown_seconds() -> u64 {
    DEFAULT_COOLDOWN_SECONDS
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl TargetConfig {
    /// Build a target with the default fetch policy and cooldown.
    pub fn new(
        site: impl Into<String>,
        label: impl Into<String>,
        page_url: impl Into<String>,
        element_path: Vec<String>,
        monitor_text: impl Into<String>,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            site: site.into(),
            label: label.into(),
            image_url: String::new(),
            page_url: page_url.into(),
            element_path,
            monitor_text: monitor_text.into(),
            recipients,
            use_proxy: false,
            cooldown_seconds: DEFAULT_COOLDOWN_SECONDS,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.element_path.is_empty() {
            return Err(ConfigError::EmptyElementPath);
        }
        if let Some(index) = self.element_path.iter().position(|s| s.trim().is_empty()) {
            return Err(ConfigError::BlankSelector { index });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Url::parse(&self.page_url).map_err(|err| ConfigError::InvalidPageUrl {
            url: self.page_url.clone(),
            reason: err.to_string(),
        })?;
        Ok(())
    }

    /// URL actually requested: the page url, prefixed by the proxy when the
    /// target asks for one.
    pub fn effective_url(&self, proxy_prefix: Option<&str>) -> Result<String, ConfigError> {
        if !self.use_proxy {
            return Ok(self.page_url.clone());
        }
        match proxy_prefix.filter(|p| !p.trim().is_empty()) {
            Some(prefix) => Ok(format!("{prefix}{}", self.page_url)),
            None => Err(ConfigError::ProxyPrefixMissing),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn with_cooldown(mut self, cooldown_seconds: u64) -> Self {
        self.cooldown_seconds = cooldown_seconds;
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = image_url.into();
        self
    }

    pub fn with_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = use_proxy;
        self
    }

    pub fn with_fetch_policy(mut self, timeout_seconds: u64, max_retries: u32) -> Self {
        self.timeout_seconds = timeout_seconds;
        self.max_retries = max_retries;
        self
    }
}
