//! Configuration aggregate for the trading core.
//!
//! Loaded once at process start from environment variables, organized by
//! domain: trading loop, fusion, orchestrator, resilience/retry, memory,
//! and risk. Each sub-config owns its own parsing and defaults; this module
//! composes them into one struct the rest of the process reads from.

mod fusion_config;
mod inot_config;
mod memory_config;
mod resilience_config;
mod risk_config;
mod trading_config;

pub use fusion_config::FusionEnvConfig;
pub use inot_config::InotEnvConfig;
pub use memory_config::MemoryEnvConfig;
pub use resilience_config::ResilienceEnvConfig;
pub use risk_config::RiskEnvConfig;
pub use trading_config::TradingEnvConfig;

use crate::domain::errors::ConfigError;

/// Aggregate configuration consumed by `src/bin/server.rs` to build every
/// component in dependency order (spec.md §6).
#[derive(Debug, Clone)]
pub struct Config {
    pub trading: TradingEnvConfig,
    pub fusion: FusionEnvConfig,
    pub inot: InotEnvConfig,
    pub resilience: ResilienceEnvConfig,
    pub memory: MemoryEnvConfig,
    pub risk: RiskEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            trading: TradingEnvConfig::from_env()?,
            fusion: FusionEnvConfig::from_env()?,
            inot: InotEnvConfig::from_env()?,
            resilience: ResilienceEnvConfig::from_env()?,
            memory: MemoryEnvConfig::from_env()?,
            risk: RiskEnvConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env_composes_all_sections() {
        let config = Config::from_env().expect("should parse with defaults");
        assert_eq!(config.trading.symbol, "EUR/USD");
        assert_eq!(config.inot.temperature, 0.0);
        assert_eq!(config.resilience.failure_threshold, 5);
    }
}
