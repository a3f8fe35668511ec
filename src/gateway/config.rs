//! Configuration for the in-process gateway

use crate::error::{CacheError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for [`MemoryGateway`](crate::gateway::MemoryGateway)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Lifetime of a stored result before jitter
    pub default_ttl: Duration,

    pub max_entries: usize,

    /// Upper bound on key + value + metadata bytes held
    pub max_size_bytes: usize,

    /// Each entry's TTL is drawn from `default_ttl * (1 ± ttl_jitter)`, so
    /// results written in one burst do not all expire together
    pub ttl_jitter: f64,

    /// Period of [`start_auto_cleanup`](crate::gateway::start_auto_cleanup)
    pub cleanup_interval: Duration,

    /// Refresh an entry's eviction position on read; off means eviction
    /// follows write order
    pub enable_lru_eviction: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60 * 60),
            max_entries: 10_000,
            max_size_bytes: 100 << 20,
            ttl_jitter: 0.125,
            cleanup_interval: Duration::from_secs(5 * 60),
            enable_lru_eviction: true,
        }
    }
}

impl GatewayConfig {
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder {
            config: Self::default(),
        }
    }

    /// Reject settings the gateway cannot honour; every problem is reported
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.default_ttl.is_zero() {
            problems.push("default_ttl is zero");
        }
        if self.max_entries == 0 {
            problems.push("max_entries is zero");
        }
        if self.max_size_bytes == 0 {
            problems.push("max_size_bytes is zero");
        }
        if !(0.0..=1.0).contains(&self.ttl_jitter) {
            problems.push("ttl_jitter is outside 0.0..=1.0");
        }
        if self.cleanup_interval.is_zero() {
            problems.push("cleanup_interval is zero");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CacheError::ConfigError(problems.join("; ")))
        }
    }

    /// TTL for one new entry
    ///
    /// A jitter that is not a number counts as none; one above 1.0 counts
    /// as 1.0.
    pub fn ttl_with_jitter(&self) -> Duration {
        if self.ttl_jitter.is_nan() || self.ttl_jitter <= 0.0 {
            return self.default_ttl;
        }

        let jitter = self.ttl_jitter.min(1.0);
        let factor = rand::thread_rng().gen_range(-jitter..=jitter);
        let secs = self.default_ttl.as_secs_f64() * (1.0 + factor);
        Duration::try_from_secs_f64(secs.max(1.0)).unwrap_or(self.default_ttl)
    }

    /// Cleanup period, falling back to the default when zero
    pub fn effective_cleanup_interval(&self) -> Duration {
        if self.cleanup_interval.is_zero() {
            Self::default().cleanup_interval
        } else {
            self.cleanup_interval
        }
    }

    /// Five-minute results for fast-moving data
    pub fn realtime() -> Self {
        Self {
            default_ttl: Duration::from_secs(5 * 60),
            max_entries: 5_000,
            max_size_bytes: 50 << 20,
            ttl_jitter: 0.15,
            cleanup_interval: Duration::from_secs(60),
            ..Self::default()
        }
    }

    /// Just under a day, so a daily refresh never finds stale entries
    pub fn daily() -> Self {
        Self {
            default_ttl: Duration::from_secs(23 * 60 * 60),
            max_entries: 50_000,
            max_size_bytes: 500 << 20,
            ttl_jitter: 0.10,
            cleanup_interval: Duration::from_secs(30 * 60),
            ..Self::default()
        }
    }

    /// Tight limits for small processes and demos
    pub fn small() -> Self {
        Self {
            default_ttl: Duration::from_secs(30 * 60),
            max_entries: 1_000,
            max_size_bytes: 10 << 20,
            ..Self::default()
        }
    }
}

/// Builder starting from [`GatewayConfig::default`]
#[derive(Debug, Clone)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    pub fn max_entries(mut self, max: usize) -> Self {
        self.config.max_entries = max;
        self
    }

    pub fn max_size_bytes(mut self, bytes: usize) -> Self {
        self.config.max_size_bytes = bytes;
        self
    }

    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.config.ttl_jitter = jitter;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    pub fn enable_lru_eviction(mut self, enable: bool) -> Self {
        self.config.enable_lru_eviction = enable;
        self
    }

    pub fn build(self) -> GatewayConfig {
        self.config
    }

    /// Build and validate
    pub fn try_build(self) -> Result<GatewayConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatewayConfig::default();
        assert_eq!(config.default_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_size_bytes, 100 * 1024 * 1024);
        assert!(config.validate().is_ok());

        for preset in [
            GatewayConfig::realtime(),
            GatewayConfig::daily(),
            GatewayConfig::small(),
        ] {
            assert!(preset.validate().is_ok());
        }
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let config = GatewayConfig {
            max_entries: 0,
            ttl_jitter: 1.5,
            ..Default::default()
        };

        match config.validate() {
            Err(CacheError::ConfigError(message)) => {
                assert!(message.contains("max_entries"));
                assert!(message.contains("ttl_jitter"));
                assert!(!message.contains("default_ttl"));
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_builder() {
        let config = GatewayConfig::builder()
            .default_ttl(Duration::from_secs(600))
            .max_entries(5)
            .ttl_jitter(0.0)
            .enable_lru_eviction(false)
            .build();

        assert_eq!(config.default_ttl, Duration::from_secs(600));
        assert_eq!(config.max_entries, 5);
        assert!(!config.enable_lru_eviction);
        assert_eq!(config.cleanup_interval, GatewayConfig::default().cleanup_interval);
        assert_eq!(config.ttl_with_jitter(), Duration::from_secs(600));

        assert!(GatewayConfig::builder().max_size_bytes(0).try_build().is_err());
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = GatewayConfig::builder()
            .default_ttl(Duration::from_secs(1000))
            .ttl_jitter(0.2)
            .build();

        for _ in 0..100 {
            let secs = config.ttl_with_jitter().as_secs_f64();
            assert!((800.0..=1200.0).contains(&secs), "ttl {} out of range", secs);
        }
    }

    #[test]
    fn test_invalid_jitter_does_not_panic() {
        let nan = GatewayConfig::builder()
            .default_ttl(Duration::from_secs(100))
            .ttl_jitter(f64::NAN)
            .build();
        assert!(nan.validate().is_err());
        assert_eq!(nan.ttl_with_jitter(), Duration::from_secs(100));

        let wide = GatewayConfig::builder()
            .default_ttl(Duration::from_secs(100))
            .ttl_jitter(f64::INFINITY)
            .build();
        for _ in 0..20 {
            let secs = wide.ttl_with_jitter().as_secs_f64();
            assert!((1.0..=200.0).contains(&secs), "ttl {} out of range", secs);
        }

        let huge = GatewayConfig::builder()
            .default_ttl(Duration::MAX)
            .ttl_jitter(0.5)
            .build();
        huge.ttl_with_jitter();
    }

    #[test]
    fn test_zero_cleanup_interval_falls_back() {
        let config = GatewayConfig::builder()
            .cleanup_interval(Duration::ZERO)
            .build();

        assert!(config.validate().is_err());
        assert_eq!(
            config.effective_cleanup_interval(),
            GatewayConfig::default().cleanup_interval
        );
    }
}
