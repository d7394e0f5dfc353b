//! Trading loop configuration: which symbol to trade and how often.

use crate::domain::errors::ConfigError;
use std::env;

#[derive(Debug, Clone)]
pub struct TradingEnvConfig {
    pub symbol: String,
    pub loop_interval_ms: u64,
    pub min_confidence: f64,
}

impl TradingEnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let min_confidence = parse_f64("TRADING_MIN_CONFIDENCE", 0.6)?;
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(ConfigError::Invalid {
                key: "trading.min_confidence".to_string(),
                reason: format!("{min_confidence} is outside [0,1]"),
            });
        }

        Ok(Self {
            symbol: env::var("TRADING_SYMBOL").unwrap_or_else(|_| "EUR/USD".to_string()),
            loop_interval_ms: parse_u64("TRADING_LOOP_INTERVAL_MS", 5_000)?,
            min_confidence,
        })
    }
}

pub(super) fn parse_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<u64>()
        .map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

pub(super) fn parse_f64(key: &str, default: f64) -> Result<f64, ConfigError> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<f64>()
        .map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

pub(super) fn parse_u32(key: &str, default: u32) -> Result<u32, ConfigError> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<u32>()
        .map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

pub(super) fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<bool>()
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trading_config_defaults() {
        let config = TradingEnvConfig::from_env().expect("should parse with defaults");
        assert_eq!(config.symbol, "EUR/USD");
        assert!(config.min_confidence >= 0.0 && config.min_confidence <= 1.0);
    }
}
