//! Engine configuration.
//!
//! Defaults match `RetryPolicy::default_v1()`; every field can be
//! overridden from `LOOM_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{DEFAULT_MAX_ATTEMPTS, TaskId};
use crate::retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry_base_delay_ms: u64,
    pub retry_multiplier: f64,
    pub retry_max_delay_ms: u64,
    /// Attempt budget for new tasks that do not ask for one.
    pub default_max_attempts: u32,
    /// Retry actions point at `{retry_route_prefix}/{task_id}/retry`.
    pub retry_route_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_base_delay_ms: 2_000,
            retry_multiplier: 2.0,
            retry_max_delay_ms: 10_000,
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_route_prefix: "/tasks".to_string(),
        }
    }
}

const BASE_DELAY: &str = "LOOM_RETRY_BASE_DELAY_MS";
const MULTIPLIER: &str = "LOOM_RETRY_MULTIPLIER";
const MAX_DELAY: &str = "LOOM_RETRY_MAX_DELAY_MS";
const MAX_ATTEMPTS: &str = "LOOM_DEFAULT_MAX_ATTEMPTS";
const ROUTE_PREFIX: &str = "LOOM_RETRY_ROUTE_PREFIX";

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value,
        reason: "not a number",
    })
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from defaults plus whatever `lookup` returns for each `LOOM_*` key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(v) = lookup(BASE_DELAY) {
            config.retry_base_delay_ms = parse(BASE_DELAY, v)?;
        }
        if let Some(v) = lookup(MULTIPLIER) {
            config.retry_multiplier = parse(MULTIPLIER, v)?;
        }
        if let Some(v) = lookup(MAX_DELAY) {
            config.retry_max_delay_ms = parse(MAX_DELAY, v)?;
        }
        if let Some(v) = lookup(MAX_ATTEMPTS) {
            config.default_max_attempts = parse(MAX_ATTEMPTS, v)?;
        }
        if let Some(v) = lookup(ROUTE_PREFIX) {
            config.retry_route_prefix = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.retry_multiplier.is_finite() || self.retry_multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                key: MULTIPLIER,
                value: self.retry_multiplier.to_string(),
                reason: "must be a finite number >= 1.0",
            });
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            return Err(ConfigError::Invalid {
                key: MAX_DELAY,
                value: self.retry_max_delay_ms.to_string(),
                reason: "must not be below the base delay",
            });
        }
        if self.default_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: MAX_ATTEMPTS,
                value: "0".to_string(),
                reason: "must be at least 1",
            });
        }
        if !self.retry_route_prefix.starts_with('/') {
            return Err(ConfigError::Invalid {
                key: ROUTE_PREFIX,
                value: self.retry_route_prefix.clone(),
                reason: "must start with '/'",
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            multiplier: self.retry_multiplier,
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    fn prefix(&self) -> &str {
        self.retry_route_prefix.trim_end_matches('/')
    }

    /// URL of the "retry task" action for `id`.
    pub fn retry_url(&self, id: TaskId) -> String {
        format!("{}/{}/retry", self.prefix(), id)
    }

    /// Resolve a retry action URL back to the task it addresses.
    pub fn parse_retry_url(&self, url: &str) -> Option<TaskId> {
        let rest = url.strip_prefix(self.prefix())?.strip_prefix('/')?;
        let id = rest.strip_suffix("/retry")?;
        id.parse().ok()
    }
}
