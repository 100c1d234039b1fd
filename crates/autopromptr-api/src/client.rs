//! HTTP client for the control surface.
//!
//! Reads (`status`, `active`, `health`) go through request governors that
//! share one circuit breaker, so a struggling server is polled less often and
//! concurrent identical reads become a single request. Writes are sent
//! directly.

use std::sync::Arc;

use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use autopromptr_batch::BatchState;
use autopromptr_config::{ClientConfig, GovernorConfig};
use autopromptr_governor::{
    BreakerSnapshot, CircuitBreaker, FailureKind, RequestFailure, RequestGovernor,
};

use crate::error::{ClientError, ErrorBody};
use crate::http::handlers::{BatchAck, BatchRequest, HealthResponse, QueueRequest};

/// A read outcome shared between de-duplicated callers. Error answers from a
/// reachable server are carried here rather than counted by the breaker.
type Reply<T> = Result<T, ClientError>;

/// Client for a running control surface.
pub struct BatchClient {
    http: reqwest::Client,
    base_url: Url,
    breaker: Arc<CircuitBreaker>,
    status_reads: RequestGovernor<Reply<BatchState>>,
    active_reads: RequestGovernor<Reply<Vec<BatchState>>>,
    health_reads: RequestGovernor<Reply<HealthResponse>>,
}

impl BatchClient {
    pub fn new(config: &ClientConfig, governor: &GovernorConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(config.base_url.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(governor.request_timeout())
            .build()
            .map_err(|e| ClientError::Transport {
                kind: FailureKind::Network,
                message: e.to_string(),
            })?;

        let breaker = Arc::new(CircuitBreaker::new(governor.clone()));
        Ok(Self {
            http,
            base_url,
            status_reads: RequestGovernor::with_breaker(breaker.clone(), governor),
            active_reads: RequestGovernor::with_breaker(breaker.clone(), governor),
            health_reads: RequestGovernor::with_breaker(breaker.clone(), governor),
            breaker,
        })
    }

    /// Current breaker state for the governed reads.
    pub fn governor_snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }

    pub async fn queue(&self, request: &QueueRequest) -> Result<BatchAck, ClientError> {
        send_write(self.http.post(self.endpoint(&["queue"])).json(request)).await
    }

    pub async fn status(&self, batch_id: &str) -> Result<BatchState, ClientError> {
        let request = self.http.get(self.endpoint(&["status", batch_id]));
        let key = format!("status:{}", batch_id);
        self.status_reads
            .call(&key, move || send_read(request))
            .await?
    }

    pub async fn stop(&self, batch_id: &str) -> Result<BatchAck, ClientError> {
        self.lifecycle("stop", batch_id).await
    }

    pub async fn active(&self) -> Result<Vec<BatchState>, ClientError> {
        let request = self.http.get(self.endpoint(&["active"]));
        self.active_reads
            .call("active", move || send_read(request))
            .await?
    }

    pub async fn rewind(&self, batch_id: &str) -> Result<BatchAck, ClientError> {
        self.lifecycle("rewind", batch_id).await
    }

    pub async fn resume(&self, batch_id: &str) -> Result<BatchAck, ClientError> {
        self.lifecycle("resume", batch_id).await
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let request = self.http.get(self.endpoint(&["health"]));
        self.health_reads
            .call("health", move || send_read(request))
            .await?
    }

    async fn lifecycle(&self, action: &str, batch_id: &str) -> Result<BatchAck, ClientError> {
        debug!("Sending {} for batch {}", action, batch_id);
        let body = BatchRequest {
            batch_id: batch_id.to_string(),
        };
        send_write(self.http.post(self.endpoint(&[action])).json(&body)).await
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

async fn send_read<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<Reply<T>, RequestFailure> {
    let response = request.send().await.map_err(transport_failure)?;
    let status = response.status();
    if status.is_server_error() {
        let body = error_body(response).await;
        return Err(RequestFailure::server(format!(
            "HTTP {}: {}",
            status.as_u16(),
            body.error
        )));
    }
    Ok(decode(response).await)
}

async fn send_write<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
    let response = request.send().await.map_err(|e| {
        let failure = transport_failure(e);
        ClientError::Transport {
            kind: failure.kind,
            message: failure.message,
        }
    })?;
    decode(response).await
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::api(status.as_u16(), error_body(response).await));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

async fn error_body(response: Response) -> ErrorBody {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or(ErrorBody {
        error: text,
        kind: String::new(),
    })
}

fn transport_failure(err: reqwest::Error) -> RequestFailure {
    if err.is_timeout() {
        RequestFailure::timeout(err.to_string())
    } else if err.is_connect() {
        RequestFailure::network(err.to_string())
    } else {
        RequestFailure::from_message(err.to_string())
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
