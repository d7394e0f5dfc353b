pub mod circuit_breaker;
pub mod fallback;
pub mod health;
pub mod retry;

pub use circuit_breaker::{CallError, CircuitBreaker};
pub use fallback::FallbackRegistry;
pub use health::{HealthRecord, HealthRegistry, HealthStatus};
pub use retry::{Retryable, RetryPolicy};
