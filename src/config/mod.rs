//! Typed configuration.
//!
//! [`QueueConfig`] is what a queue is constructed from: built in code,
//! parsed from TOML, or read from environment variables. [`Config`] is the
//! process-level view used by the `delayq` binary; it loads once at startup
//! and fails fast on malformed values.

use crate::error::{Error, Result};
use crate::model::duration_ms;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_AUTO_ADVANCE: &str = "DELAYQ_AUTO_ADVANCE";
pub const ENV_DEFAULT_DELAY_MS: &str = "DELAYQ_DEFAULT_DELAY_MS";
pub const ENV_CONFIG_PATH: &str = "DELAYQ_CONFIG";

/// Per-queue settings. Fixed once the queue is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Start the next slot as soon as one is enqueued or released.
    /// When false the caller must call `advance()` after each release.
    pub auto_advance: bool,
    /// Delay for slots enqueued without an explicit one.
    pub default_delay_ms: u64,
}

impl QueueConfig {
    pub fn auto_advance(mut self, auto_advance: bool) -> Self {
        self.auto_advance = auto_advance;
        self
    }

    /// Sub-millisecond precision is truncated.
    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay_ms = duration_ms(delay);
        self
    }

    /// The delay a slot runs with: the override when given, else the default.
    pub fn delay_or_default(&self, delay: Option<Duration>) -> Duration {
        delay.unwrap_or(Duration::from_millis(self.default_delay_ms))
    }

    /// Parse from a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("bad queue config: {e}")))
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read queue config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults overlaid with `DELAYQ_AUTO_ADVANCE` / `DELAYQ_DEFAULT_DELAY_MS`.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Overlay whichever queue variables are set in the environment.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(raw) = optional_var(ENV_AUTO_ADVANCE) {
            self.auto_advance = parse_bool(ENV_AUTO_ADVANCE, &raw)?;
        }
        if let Some(raw) = optional_var(ENV_DEFAULT_DELAY_MS) {
            self.default_delay_ms = parse_var(ENV_DEFAULT_DELAY_MS, &raw)?;
        }
        Ok(self)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(format!("serialize queue config: {e}")))
    }
}

/// Process configuration for the `delayq` binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub queue: QueueConfig,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// If `DELAYQ_CONFIG` names a TOML file it is read first, then the
    /// queue variables override it. In local dev, call `dotenvy::dotenv().ok()`
    /// before this.
    pub fn from_env() -> Result<Self> {
        let base = match optional_var(ENV_CONFIG_PATH) {
            Some(path) => QueueConfig::load(Path::new(&path))?,
            None => QueueConfig::default(),
        };

        Ok(Self {
            queue: base.with_env_overrides()?,
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}

/// Unset and empty are treated the same.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("environment variable {name}={raw:?}: {e}")))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "environment variable {name}={raw:?}: expected a boolean"
        ))),
    }
}
