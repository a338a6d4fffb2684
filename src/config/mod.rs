//! Client configuration: backend endpoint, reveal timings and polling policy.
//!
//! Every section has a `Default` matching the behaviour of the web client, so an
//! empty TOML file or an empty environment yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub gateway: GatewayConfig,
    pub reveal: RevealConfig,
    pub poll: PollConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Path the navigator is sent to when the backend answers 401.
    pub auth_page: String,
    /// `None` leaves timeouts to the transport.
    pub request_timeout_secs: Option<u64>,
    pub user_agent: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RevealConfig {
    /// Per-character delay for plain paragraphs on first view.
    pub plain_char_delay_ms: u64,
    /// Per-character delay for illustrated paragraphs, continuations and choices.
    pub char_delay_ms: u64,
    pub paragraph_pause_ms: u64,
    pub choice_pause_ms: u64,
    /// Pause between two portrait generations.
    pub image_cooldown_ms: u64,
    pub image_size: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Backoff {
    Fixed,
    Exponential {
        factor: f64,
        max_interval_ms: u64,
        #[serde(default)]
        jitter: bool,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PollErrorPolicy {
    /// Log the failed fetch, count it as an attempt and keep polling.
    Continue,
    /// Stop and return the first fetch error.
    Abort,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub on_error: PollErrorPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            auth_page: "/auth".to_string(),
            request_timeout_secs: None,
            user_agent: format!("muse/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            plain_char_delay_ms: 100,
            char_delay_ms: 30,
            paragraph_pause_ms: 200,
            choice_pause_ms: 200,
            image_cooldown_ms: 1000,
            image_size: "1280x960".to_string(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_attempts: 30,
            backoff: Backoff::Fixed,
            on_error: PollErrorPolicy::Abort,
        }
    }
}

impl GatewayConfig {
    pub fn parsed_base_url(&self) -> ConfigResult<Url> {
        Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidValue {
            key: "gateway.base_url".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl RevealConfig {
    /// Zero delays everywhere; handy for headless rendering.
    pub fn instant() -> Self {
        Self {
            plain_char_delay_ms: 0,
            char_delay_ms: 0,
            paragraph_pause_ms: 0,
            choice_pause_ms: 0,
            image_cooldown_ms: 0,
            ..Self::default()
        }
    }
}

impl PollConfig {
    /// Payment confirmation: every 10 s for 5 minutes, tolerating failed checks.
    pub fn payment() -> Self {
        Self {
            interval_ms: 10_000,
            max_attempts: 30,
            backoff: Backoff::Fixed,
            on_error: PollErrorPolicy::Continue,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl ClientConfig {
    /// Loads `.env` (if present) and overlays the `MUSE_*` variables on the defaults.
    ///
    /// # Environment Variables
    /// - `MUSE_ENDPOINT`: backend base URL
    /// - `MUSE_AUTH_PAGE`: redirect target on 401
    /// - `MUSE_REQUEST_TIMEOUT_SECS`: optional request timeout
    /// - `MUSE_POLL_INTERVAL_MS`, `MUSE_POLL_MAX_ATTEMPTS`: task polling
    pub fn from_env() -> ConfigResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("MUSE_ENDPOINT") {
            config.gateway.base_url = endpoint;
        }
        if let Some(page) = lookup("MUSE_AUTH_PAGE") {
            config.gateway.auth_page = page;
        }
        if let Some(raw) = lookup("MUSE_REQUEST_TIMEOUT_SECS") {
            config.gateway.request_timeout_secs = Some(parse_number("MUSE_REQUEST_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = lookup("MUSE_POLL_INTERVAL_MS") {
            config.poll.interval_ms = parse_number("MUSE_POLL_INTERVAL_MS", &raw)?;
        }
        if let Some(raw) = lookup("MUSE_POLL_MAX_ATTEMPTS") {
            config.poll.max_attempts = parse_number("MUSE_POLL_MAX_ATTEMPTS", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.gateway.parsed_base_url()?;
        if !self.gateway.auth_page.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "gateway.auth_page".to_string(),
                reason: "must be an absolute path".to_string(),
            });
        }
        if self.poll.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "poll.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let Backoff::Exponential { factor, .. } = self.poll.backoff {
            if factor < 1.0 {
                return Err(ConfigError::InvalidValue {
                    key: "poll.backoff.factor".to_string(),
                    reason: format!("{factor} would shrink the interval"),
                });
            }
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> ConfigResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
