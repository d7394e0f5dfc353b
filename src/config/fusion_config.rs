//! Input Fusion Engine configuration: alignment window and buffer sizing.

use crate::config::trading_config::{parse_u64, parse_u32};
use crate::domain::errors::ConfigError;

#[derive(Debug, Clone)]
pub struct FusionEnvConfig {
    pub sync_window_ms: u64,
    pub buffer_size: u32,
    pub cleanup_interval_ms: u64,
}

impl FusionEnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            sync_window_ms: parse_u64("FUSION_SYNC_WINDOW_MS", 100)?,
            buffer_size: parse_u32("FUSION_BUFFER_SIZE", 1000)?,
            cleanup_interval_ms: parse_u64("FUSION_CLEANUP_INTERVAL_MS", 60_000)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fusion_config_defaults() {
        let config = FusionEnvConfig::from_env().expect("should parse with defaults");
        assert_eq!(config.sync_window_ms, 100);
        assert_eq!(config.buffer_size, 1000);
    }
}
