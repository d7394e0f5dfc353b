//! HTTP-backed `LlmClient` over an OpenAI-compatible chat completion endpoint,
//! wrapped in `reqwest-retry` middleware for transport-level retries; the
//! INoT Orchestrator's own retry-with-stricter-prompt loop sits above this.

use crate::application::orchestrator::llm_client::{LlmClient, LlmError, LlmRequest};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::time::Duration;

pub struct HttpLlmClient {
    client: ClientWithMiddleware,
    endpoint: String,
    api_key: String,
    model_version: String,
}

impl HttpLlmClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model_version: impl Into<String>) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let base = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client builds with static config");

        let client = reqwest_middleware::ClientBuilder::new(base)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model_version: model_version.into(),
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model_version,
            "temperature": request.temperature,
            "top_p": request.top_p,
            "max_tokens": request.max_tokens,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt},
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transient(e.to_string()))?;

        if response.status().is_server_error() || response.status() == 429 {
            return Err(LlmError::Transient(format!("status {}", response.status())));
        }
        if !response.status().is_success() {
            return Err(LlmError::Permanent(format!("status {}", response.status())));
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Permanent(format!("invalid response body: {e}")))?;

        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::Permanent("missing choices[0].message.content".to_string()))
    }
}
