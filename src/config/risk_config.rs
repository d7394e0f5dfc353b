//! Risk parameter configuration shared between sizing and the rule-based
//! fallback path (spec.md §6 `risk.*`).

use crate::domain::errors::ConfigError;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct RiskEnvConfig {
    pub max_risk_per_trade_percent: Decimal,
    pub default_stop_distance: Decimal,
}

impl RiskEnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_risk_per_trade_percent: parse_decimal(
                "RISK_MAX_RISK_PER_TRADE_PERCENT",
                "0.01",
            )?,
            default_stop_distance: parse_decimal("RISK_DEFAULT_STOP_DISTANCE", "0.0050")?,
        })
    }
}

fn parse_decimal(key: &str, default: &str) -> Result<Decimal, ConfigError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    Decimal::from_str(&raw).map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_risk_config_defaults() {
        let config = RiskEnvConfig::from_env().expect("should parse with defaults");
        assert_eq!(config.max_risk_per_trade_percent, dec!(0.01));
    }
}
