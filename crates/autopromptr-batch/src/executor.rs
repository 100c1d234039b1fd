//! Prompt executors.
//!
//! The processor hands each prompt to an [`Executor`] and records whatever it
//! returns. Executors never see batch state.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use autopromptr_config::ExecutorConfig;

use crate::batch::{Prompt, Target};
use crate::error::ExecutorError;

/// Runs one prompt against a target platform.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute a prompt and return the opaque result payload.
    async fn execute_prompt(&self, prompt: &Prompt, target: &Target) -> Result<Value, ExecutorError>;
}

/// Executor that reports success without touching the network.
#[derive(Debug, Default, Clone)]
pub struct SimulatedExecutor;

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for SimulatedExecutor {
    async fn execute_prompt(&self, prompt: &Prompt, target: &Target) -> Result<Value, ExecutorError> {
        debug!("Simulating prompt '{}' on {}", prompt.id, target.platform);
        Ok(json!({
            "success": true,
            "promptId": prompt.id,
            "platform": target.platform,
            "executedAt": Utc::now().to_rfc3339(),
        }))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AutomateRequest<'a> {
    target_url: &'a str,
    prompt_text: &'a str,
    platform: &'a str,
    wait_for_idle: bool,
    max_retries: u32,
    /// Milliseconds.
    timeout: u64,
}

/// Executor that calls the browser automation server's `/api/automate`.
pub struct HttpExecutor {
    client: reqwest::Client,
    endpoint: String,
    config: ExecutorConfig,
}

impl HttpExecutor {
    /// Create an executor for the configured automation server.
    pub fn new(config: &ExecutorConfig) -> Result<Self, ExecutorError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ExecutorError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/automate", config.automation_url.trim_end_matches('/')),
            config: config.clone(),
        })
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ExecutorError {
        if err.is_timeout() {
            ExecutorError::Timeout(self.config.timeout_secs)
        } else {
            ExecutorError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute_prompt(&self, prompt: &Prompt, target: &Target) -> Result<Value, ExecutorError> {
        let request = AutomateRequest {
            target_url: &target.url,
            prompt_text: &prompt.text,
            platform: &target.platform,
            wait_for_idle: self.config.wait_for_idle,
            max_retries: self.config.server_retries,
            timeout: self.config.timeout_secs.saturating_mul(1000),
        };

        debug!("POST {} for prompt '{}'", self.endpoint, prompt.id);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(ExecutorError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| ExecutorError::InvalidResponse(e.to_string()))?;

        if payload.get("success").and_then(Value::as_bool) == Some(false) {
            let message = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("automation reported failure")
                .to_string();
            return Err(ExecutorError::Failed(message));
        }

        Ok(payload)
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
