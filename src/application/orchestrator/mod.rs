pub mod llm_client;
pub mod orchestrator;
pub mod prompt;
pub mod validate;

pub use llm_client::{LlmClient, LlmError, LlmRequest, MockLlmClient};
pub use orchestrator::{InotConfig, Orchestrator};
