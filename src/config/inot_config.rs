//! INoT Orchestrator configuration: model parameters, budgets, and the
//! acting confidence threshold (spec.md §6 `inot.*`).

use crate::config::trading_config::{parse_bool, parse_f64, parse_u32, parse_u64};
use crate::domain::errors::ConfigError;
use std::env;

#[derive(Debug, Clone)]
pub struct InotEnvConfig {
    pub enabled: bool,
    pub model_version: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub max_daily_cost_cents: u64,
    pub max_daily_decisions: u32,
    pub confidence_threshold: f64,
    pub max_validation_attempts: u32,
    pub calibration_refit_interval_secs: u64,
}

impl InotEnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let temperature = parse_f64("INOT_TEMPERATURE", 0.0)?;
        if temperature != 0.0 {
            return Err(ConfigError::Invalid {
                key: "inot.temperature".to_string(),
                reason: "must be 0.0 for deterministic reasoning".to_string(),
            });
        }

        let confidence_threshold = parse_f64("INOT_CONFIDENCE_THRESHOLD", 0.55)?;
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(ConfigError::Invalid {
                key: "inot.confidence_threshold".to_string(),
                reason: format!("{confidence_threshold} is outside [0,1]"),
            });
        }

        Ok(Self {
            enabled: parse_bool("INOT_ENABLED", true),
            model_version: env::var("INOT_MODEL_VERSION")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            temperature,
            top_p: parse_f64("INOT_TOP_P", 1.0)?,
            max_tokens: parse_u32("INOT_MAX_TOKENS", 1024)?,
            max_daily_cost_cents: parse_u64("INOT_MAX_DAILY_COST_CENTS", 500)?,
            max_daily_decisions: parse_u32("INOT_MAX_DAILY_DECISIONS", 200)?,
            confidence_threshold,
            max_validation_attempts: parse_u32("INOT_MAX_VALIDATION_ATTEMPTS", 3)?,
            calibration_refit_interval_secs: parse_u64(
                "INOT_CALIBRATION_REFIT_INTERVAL_SECS",
                86_400,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inot_config_defaults() {
        let config = InotEnvConfig::from_env().expect("should parse with defaults");
        assert_eq!(config.temperature, 0.0);
        assert!(config.enabled);
    }
}
