//! Memory Store configuration: database location and retention policy
//! (spec.md §6 `memory.*`).

use crate::config::trading_config::parse_u64;
use crate::domain::errors::ConfigError;
use std::env;

#[derive(Debug, Clone)]
pub struct MemoryEnvConfig {
    pub db_path: String,
    pub retention_days: u64,
}

impl MemoryEnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            db_path: env::var("MEMORY_DB_PATH").unwrap_or_else(|_| "data/aegis.db".to_string()),
            retention_days: parse_u64("MEMORY_RETENTION_DAYS", 90)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config_defaults() {
        let config = MemoryEnvConfig::from_env().expect("should parse with defaults");
        assert_eq!(config.retention_days, 90);
    }
}
