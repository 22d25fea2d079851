//! Runtime configuration.

use std::time::Duration;

use thiserror::Error;

use stockroom_inventory::FreezePolicy;

pub const ENV_READINESS_TIMEOUT_MS: &str = "STOCKROOM_READINESS_TIMEOUT_MS";
pub const ENV_WRITE_TIMEOUT_MS: &str = "STOCKROOM_WRITE_TIMEOUT_MS";
pub const ENV_FREEZE_POLICY: &str = "STOCKROOM_FREEZE_POLICY";
pub const ENV_REQUIRE_DISTINCT_REVIEWER: &str = "STOCKROOM_REQUIRE_DISTINCT_REVIEWER";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name}: expected a number of milliseconds, got '{value}'")]
    InvalidDuration { name: &'static str, value: String },

    #[error("{name}: expected true or false, got '{value}'")]
    InvalidFlag { name: &'static str, value: String },

    #[error("{name}: {message}")]
    InvalidValue { name: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockroomConfig {
    /// How long `open` waits for every collection before reporting degraded.
    pub readiness_timeout: Duration,
    /// Deadline for a single atomic write.
    pub write_timeout: Duration,
    pub freeze_policy: FreezePolicy,
    /// Whether the reviewer of a count must differ from its counter.
    pub require_distinct_reviewer: bool,
}

impl Default for StockroomConfig {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_millis(10_000),
            write_timeout: Duration::from_millis(5_000),
            freeze_policy: FreezePolicy::Enforced,
            require_distinct_reviewer: true,
        }
    }
}

impl StockroomConfig {
    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_freeze_policy(mut self, policy: FreezePolicy) -> Self {
        self.freeze_policy = policy;
        self
    }

    pub fn with_distinct_reviewer(mut self, required: bool) -> Self {
        self.require_distinct_reviewer = required;
        self
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read overrides through `lookup`; unset variables keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_READINESS_TIMEOUT_MS) {
            config.readiness_timeout = parse_millis(ENV_READINESS_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_WRITE_TIMEOUT_MS) {
            config.write_timeout = parse_millis(ENV_WRITE_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_FREEZE_POLICY) {
            config.freeze_policy = value.parse().map_err(|e: stockroom_core::DomainError| {
                ConfigError::InvalidValue {
                    name: ENV_FREEZE_POLICY,
                    message: e.to_string(),
                }
            })?;
        }
        if let Some(value) = lookup(ENV_REQUIRE_DISTINCT_REVIEWER) {
            config.require_distinct_reviewer = parse_flag(ENV_REQUIRE_DISTINCT_REVIEWER, &value)?;
        }

        Ok(config)
    }
}

fn parse_millis(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidDuration {
            name,
            value: value.to_string(),
        }),
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}
