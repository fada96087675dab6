use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use time_machine::Timeframe;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Root of the CSV data layout (`ohlcv/`, `trades.csv`, ...)
    pub data_dir: PathBuf,
    pub cache_ttl_secs: i64,
    pub default_symbol: String,
    pub default_timeframe: Timeframe,
    pub default_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            data_dir: PathBuf::from("data"),
            cache_ttl_secs: time_machine::query::DEFAULT_CACHE_TTL_SECS,
            default_symbol: time_machine::query::DEFAULT_SYMBOL.to_string(),
            default_timeframe: Timeframe::Hour1,
            default_limit: time_machine::window::DEFAULT_PAGE_LIMIT,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            bind_addr: env::var("TIME_MACHINE_BIND").unwrap_or(defaults.bind_addr),
            data_dir: env::var("TIME_MACHINE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            cache_ttl_secs: match env::var("TIME_MACHINE_CACHE_TTL_SECS") {
                Ok(v) => v
                    .parse()
                    .with_context(|| format!("TIME_MACHINE_CACHE_TTL_SECS is not an integer: {v}"))?,
                Err(_) => defaults.cache_ttl_secs,
            },
            default_symbol: env::var("TIME_MACHINE_DEFAULT_SYMBOL")
                .map(|s| s.to_uppercase())
                .unwrap_or(defaults.default_symbol),
            default_timeframe: match env::var("TIME_MACHINE_DEFAULT_TIMEFRAME") {
                Ok(v) => v
                    .parse()
                    .with_context(|| format!("TIME_MACHINE_DEFAULT_TIMEFRAME is invalid: {v}"))?,
                Err(_) => defaults.default_timeframe,
            },
            default_limit: match env::var("TIME_MACHINE_DEFAULT_LIMIT") {
                Ok(v) => v
                    .parse()
                    .with_context(|| format!("TIME_MACHINE_DEFAULT_LIMIT is not an integer: {v}"))?,
                Err(_) => defaults.default_limit,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_secs < 0 {
            anyhow::bail!("TIME_MACHINE_CACHE_TTL_SECS must be >= 0");
        }
        if self.default_limit == 0 || self.default_limit > time_machine::window::MAX_PAGE_LIMIT {
            anyhow::bail!(
                "TIME_MACHINE_DEFAULT_LIMIT must be between 1 and {}",
                time_machine::window::MAX_PAGE_LIMIT
            );
        }
        if self.default_symbol.trim().is_empty() {
            anyhow::bail!("TIME_MACHINE_DEFAULT_SYMBOL must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_limit, 500);
        assert_eq!(config.cache_ttl_secs, 300);
        assert_eq!(config.default_timeframe, Timeframe::Hour1);
    }

    #[test]
    fn test_validate_rejects_bad_limit() {
        let config = ServerConfig {
            default_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            default_limit: 5_001,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_ttl() {
        let config = ServerConfig {
            cache_ttl_secs: -1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
