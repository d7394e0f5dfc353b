pub mod llm;
pub mod persistence;
pub mod resilience;
