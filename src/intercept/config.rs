//! Interceptor configuration

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable switching interception on or off
pub const ENV_CACHE_ENABLED: &str = "MEMO_CACHE_ENABLED";

/// Environment variable selecting the [`KeyFailurePolicy`]
pub const ENV_KEY_FAILURE: &str = "MEMO_KEY_FAILURE";

/// What to do when a call's key cannot be derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyFailurePolicy {
    /// Run the call without touching the cache
    #[default]
    Bypass,
    /// Use the empty string as the key (every failing call shares one entry)
    EmptyKey,
}

impl fmt::Display for KeyFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFailurePolicy::Bypass => write!(f, "bypass"),
            KeyFailurePolicy::EmptyKey => write!(f, "empty-key"),
        }
    }
}

impl FromStr for KeyFailurePolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bypass" => Ok(KeyFailurePolicy::Bypass),
            "empty-key" | "empty_key" | "emptykey" => Ok(KeyFailurePolicy::EmptyKey),
            other => Err(CacheError::ConfigError(format!(
                "{} must be 'bypass' or 'empty-key', got '{}'",
                ENV_KEY_FAILURE, other
            ))),
        }
    }
}

/// Configuration for [`CachingInterceptor`](crate::intercept::CachingInterceptor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptorConfig {
    /// When false every call bypasses the cache
    pub enabled: bool,

    /// Behaviour on key derivation failure
    pub key_failure: KeyFailurePolicy,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key_failure: KeyFailurePolicy::Bypass,
        }
    }
}

impl InterceptorConfig {
    pub fn builder() -> InterceptorConfigBuilder {
        InterceptorConfigBuilder::default()
    }

    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source; unset variables keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_CACHE_ENABLED) {
            config.enabled = parse_flag(&raw).ok_or_else(|| {
                CacheError::ConfigError(format!(
                    "{} must be a boolean, got '{}'",
                    ENV_CACHE_ENABLED, raw
                ))
            })?;
        }

        if let Some(raw) = lookup(ENV_KEY_FAILURE) {
            config.key_failure = raw.parse()?;
        }

        Ok(config)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for interceptor configuration
#[derive(Debug, Default)]
pub struct InterceptorConfigBuilder {
    enabled: Option<bool>,
    key_failure: Option<KeyFailurePolicy>,
}

impl InterceptorConfigBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn key_failure(mut self, policy: KeyFailurePolicy) -> Self {
        self.key_failure = Some(policy);
        self
    }

    pub fn build(self) -> InterceptorConfig {
        let defaults = InterceptorConfig::default();

        InterceptorConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            key_failure: self.key_failure.unwrap_or(defaults.key_failure),
        }
    }
}
