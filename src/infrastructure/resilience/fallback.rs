//! Fallback registry: capability-keyed handlers the Decision Engine can swap
//! to when the primary path (orchestrator, a broker adapter) is unavailable.
//! The rule-based decision path (domain::analytics::order_builder) is itself
//! registered as the fallback for the `"reasoning"` capability.

use crate::domain::errors::NoFallbackError;
use std::collections::HashMap;
use std::sync::RwLock;

pub struct FallbackRegistry<T> {
    handlers: RwLock<HashMap<String, T>>,
}

impl<T: Clone> FallbackRegistry<T> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, capability: impl Into<String>, handler: T) {
        self.handlers
            .write()
            .expect("fallback registry lock poisoned")
            .insert(capability.into(), handler);
    }

    pub fn get(&self, capability: &str) -> Option<T> {
        self.handlers
            .read()
            .expect("fallback registry lock poisoned")
            .get(capability)
            .cloned()
    }

    /// Spec-named operation (spec.md §4.2): looks up the handler registered
    /// for `capability` and fails `NoFallback` instead of silently returning
    /// `None`, so callers on the circuit-breaker-open path get a typed error
    /// they can propagate rather than a lookup they must remember to check.
    pub fn execute(&self, capability: &str) -> Result<T, NoFallbackError> {
        self.get(capability).ok_or_else(|| NoFallbackError {
            capability: capability.to_string(),
        })
    }
}

impl<T: Clone> Default for FallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
