//! The LLM call boundary: one request, one completion containing all four
//! agent sections (spec.md §4.5). Kept a thin trait so tests can swap in a
//! deterministic mock.

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub enum LlmError {
    Transient(String),
    Permanent(String),
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::Transient(msg) => write!(f, "transient LLM failure: {msg}"),
            LlmError::Permanent(msg) => write!(f, "permanent LLM failure: {msg}"),
        }
    }
}

impl std::error::Error for LlmError {}

impl crate::infrastructure::resilience::Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Transient(_))
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError>;
}

/// Deterministic mock used in tests and as a budget-exceeded fallback path;
/// returns a fixed, schema-valid four-agent completion.
pub struct MockLlmClient {
    pub fixed_response: String,
}

impl MockLlmClient {
    pub fn new(fixed_response: impl Into<String>) -> Self {
        Self {
            fixed_response: fixed_response.into(),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _request: &LlmRequest) -> Result<String, LlmError> {
        Ok(self.fixed_response.clone())
    }
}
