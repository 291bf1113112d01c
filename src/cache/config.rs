//! Configuration for the asset cache

use crate::error::{AssetError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Default maximum entry age: 30 minutes
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 60);

/// Default capacity: 50 entries
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Default interval of the background sweep: 10 minutes
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Configuration for the asset cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entries at least this old are treated as misses
    pub max_age: Duration,

    /// Maximum number of entries held at once
    pub max_entries: usize,

    /// Interval of the background sweep
    pub sweep_interval: Duration,

    /// Whether [`AssetCache::spawn_sweeper`](crate::cache::AssetCache::spawn_sweeper)
    /// callers should start the background sweep
    pub enable_auto_sweep: bool,

    /// Enable hit/miss/eviction counters
    pub enable_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            max_entries: DEFAULT_MAX_ENTRIES,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            enable_auto_sweep: true,
            enable_metrics: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_entries == 0 {
            return Err("max_entries must be greater than 0".to_string());
        }

        if self.max_age.is_zero() {
            return Err("max_age must be greater than 0".to_string());
        }

        if self.sweep_interval.is_zero() {
            return Err("sweep_interval must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Load configuration from the environment
    ///
    /// A `.env` file is read first if present. Recognised variables:
    /// `IMGCACHE_MAX_AGE_SECS`, `IMGCACHE_MAX_ENTRIES`,
    /// `IMGCACHE_SWEEP_INTERVAL_SECS`, `IMGCACHE_AUTO_SWEEP`. Unset
    /// variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = Self::builder();
        if let Some(secs) = env_value::<u64>("IMGCACHE_MAX_AGE_SECS")? {
            builder = builder.max_age(Duration::from_secs(secs));
        }
        if let Some(max) = env_value::<usize>("IMGCACHE_MAX_ENTRIES")? {
            builder = builder.max_entries(max);
        }
        if let Some(secs) = env_value::<u64>("IMGCACHE_SWEEP_INTERVAL_SECS")? {
            builder = builder.sweep_interval(Duration::from_secs(secs));
        }
        if let Some(enable) = env_value::<bool>("IMGCACHE_AUTO_SWEEP")? {
            builder = builder.enable_auto_sweep(enable);
        }

        let config = builder.build();
        config.validate().map_err(AssetError::Config)?;
        Ok(config)
    }
}

fn env_value<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AssetError::Config(format!("{}={:?}: {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    max_age: Option<Duration>,
    max_entries: Option<usize>,
    sweep_interval: Option<Duration>,
    enable_auto_sweep: Option<bool>,
    enable_metrics: Option<bool>,
}

impl CacheConfigBuilder {
    /// Set the maximum entry age
    pub fn max_age(mut self, age: Duration) -> Self {
        self.max_age = Some(age);
        self
    }

    /// Set maximum number of cache entries
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Set the background sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Enable or disable the background sweep
    pub fn enable_auto_sweep(mut self, enable: bool) -> Self {
        self.enable_auto_sweep = Some(enable);
        self
    }

    /// Enable or disable metrics collection
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = Some(enable);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            max_age: self.max_age.unwrap_or(defaults.max_age),
            max_entries: self.max_entries.unwrap_or(defaults.max_entries),
            sweep_interval: self.sweep_interval.unwrap_or(defaults.sweep_interval),
            enable_auto_sweep: self.enable_auto_sweep.unwrap_or(defaults.enable_auto_sweep),
            enable_metrics: self.enable_metrics.unwrap_or(defaults.enable_metrics),
        }
    }
}

/// Preset configurations
impl CacheConfig {
    /// Larger cache for pages with many above-the-fold images
    pub fn gallery() -> Self {
        Self {
            max_entries: 200,
            max_age: Duration::from_secs(60 * 60),
            ..Default::default()
        }
    }

    /// Small cache without background sweeping, for tests and tools
    pub fn ephemeral() -> Self {
        Self {
            max_entries: 8,
            max_age: Duration::from_secs(60),
            enable_auto_sweep: false,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_age, Duration::from_secs(1800));
        assert_eq!(config.max_entries, 50);
        assert_eq!(config.sweep_interval, Duration::from_secs(600));
        assert!(config.enable_auto_sweep);
    }

    #[test]
    fn test_config_validation() {
        assert!(CacheConfig::default().validate().is_ok());

        let mut invalid = CacheConfig::default();
        invalid.max_entries = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = CacheConfig::default();
        invalid.max_age = Duration::ZERO;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .max_age(Duration::from_secs(600))
            .max_entries(5)
            .enable_auto_sweep(false)
            .build();

        assert_eq!(config.max_age, Duration::from_secs(600));
        assert_eq!(config.max_entries, 5);
        assert!(!config.enable_auto_sweep);
        assert_eq!(config.sweep_interval, DEFAULT_SWEEP_INTERVAL);
    }

    #[test]
    fn test_preset_configs() {
        assert_eq!(CacheConfig::gallery().max_entries, 200);
        assert!(!CacheConfig::ephemeral().enable_auto_sweep);
        assert!(CacheConfig::ephemeral().validate().is_ok());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("IMGCACHE_MAX_ENTRIES", "12");
        std::env::set_var("IMGCACHE_AUTO_SWEEP", "false");
        let config = CacheConfig::from_env().unwrap();
        assert_eq!(config.max_entries, 12);
        assert!(!config.enable_auto_sweep);

        std::env::set_var("IMGCACHE_MAX_ENTRIES", "lots");
        let err = CacheConfig::from_env().unwrap_err();
        assert!(matches!(err, AssetError::Config(_)));

        std::env::set_var("IMGCACHE_MAX_ENTRIES", "0");
        assert!(CacheConfig::from_env().is_err());

        std::env::remove_var("IMGCACHE_MAX_ENTRIES");
        std::env::remove_var("IMGCACHE_AUTO_SWEEP");
    }
}
