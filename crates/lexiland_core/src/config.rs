//! Runtime configuration for the annotation client and batch runner.
//!
//! # Responsibility
//! - Provide defaults that work against a local annotation backend.
//! - Read overrides from `LEXILAND_*` environment variables.
//!
//! # Invariants
//! - `base_url` never ends with `/`.
//! - Batch concurrency is always within `1..=MAX_BATCH_CONCURRENCY`.

use crate::model::word::Level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const ENV_API_URL: &str = "LEXILAND_API_URL";
pub const ENV_API_TIMEOUT_SECS: &str = "LEXILAND_API_TIMEOUT_SECS";
pub const ENV_LEVEL: &str = "LEXILAND_LEVEL";

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BATCH_CONCURRENCY: usize = 2;
pub const DEFAULT_BATCH_PACING_MS: u64 = 300;
pub const MAX_BATCH_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Annotation service connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub default_level: Level,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_level: Level::default(),
        }
    }
}

impl ClientConfig {
    /// Builds a config from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            config.base_url = normalize_base_url(&url)?;
        }

        if let Some(raw) = lookup(ENV_API_TIMEOUT_SECS) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: ENV_API_TIMEOUT_SECS,
                    value: raw.clone(),
                    reason: "expected a positive number of seconds",
                })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup(ENV_LEVEL) {
            config.default_level = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_LEVEL,
                value: raw.clone(),
                reason: "expected one of A2|B1|B2|C1|C2",
            })?;
        }

        Ok(config)
    }

    pub fn with_base_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.base_url = normalize_base_url(url)?;
        Ok(self)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Dispatch settings for batch annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Number of requests allowed in flight at once.
    pub concurrency: usize,
    /// Delay each worker waits between two of its own requests.
    pub pacing: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_BATCH_CONCURRENCY,
            pacing: Duration::from_millis(DEFAULT_BATCH_PACING_MS),
        }
    }
}

impl BatchOptions {
    pub fn new(concurrency: usize, pacing: Duration) -> Self {
        Self {
            concurrency: concurrency.clamp(1, MAX_BATCH_CONCURRENCY),
            pacing,
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, ConfigError> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            key: ENV_API_URL,
            value: url.to_string(),
            reason: "expected an http:// or https:// URL",
        });
    }
    Ok(trimmed.to_string())
}
