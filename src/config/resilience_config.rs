//! Circuit breaker and retry policy configuration (spec.md §6
//! `resilience.*` / `retry.*`).

use crate::config::trading_config::{parse_u32, parse_u64};
use crate::domain::errors::ConfigError;

#[derive(Debug, Clone)]
pub struct ResilienceEnvConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub half_open_max_successes: u32,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl ResilienceEnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            failure_threshold: parse_u32("RESILIENCE_FAILURE_THRESHOLD", 5)?,
            recovery_timeout_ms: parse_u64("RESILIENCE_RECOVERY_TIMEOUT_MS", 30_000)?,
            half_open_max_successes: parse_u32("RESILIENCE_HALF_OPEN_MAX_SUCCESSES", 3)?,
            retry_max_attempts: parse_u32("RETRY_MAX_ATTEMPTS", 3)?,
            retry_base_delay_ms: parse_u64("RETRY_BASE_DELAY_MS", 200)?,
            retry_max_delay_ms: parse_u64("RETRY_MAX_DELAY_MS", 5_000)?,
        })
    }
}
