//! Batch control handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use autopromptr_batch::{BatchState, BatchStatus, Prompt, Target};

use crate::error::ApiError;
use crate::state::AppState;

/// A prompt as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptInput {
    /// Defaults to `prompt-{n}` (1-based) when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
}

/// Request to queue a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRequest {
    /// Generated when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub prompts: Vec<PromptInput>,
    pub target_url: String,
    pub platform: String,
}

impl QueueRequest {
    fn into_parts(self) -> Result<(String, Vec<Prompt>, Target), ApiError> {
        if self.target_url.trim().is_empty() {
            return Err(ApiError::BadRequest("targetUrl must not be empty".to_string()));
        }
        if self.platform.trim().is_empty() {
            return Err(ApiError::BadRequest("platform must not be empty".to_string()));
        }

        let mut prompts = Vec::with_capacity(self.prompts.len());
        for (i, input) in self.prompts.into_iter().enumerate() {
            if input.text.trim().is_empty() {
                return Err(ApiError::BadRequest(format!(
                    "prompt {} has empty text",
                    i + 1
                )));
            }
            let id = input.id.unwrap_or_else(|| format!("prompt-{}", i + 1));
            prompts.push(Prompt::new(id, input.text));
        }

        let batch_id = self
            .batch_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Ok((batch_id, prompts, Target::new(self.target_url, self.platform)))
    }
}

/// Request naming one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub batch_id: String,
}

/// Acknowledgement of a lifecycle action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAck {
    pub batch_id: String,
    pub status: BatchStatus,
}

impl From<&BatchState> for BatchAck {
    fn from(state: &BatchState) -> Self {
        Self {
            batch_id: state.id.clone(),
            status: state.status,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub active_batches: usize,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub uptime_secs: u64,
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// `POST /queue`
pub async fn queue_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueueRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (batch_id, prompts, target) = parse_body(payload)?.into_parts()?;
    info!("Queue request for batch {} ({} prompts)", batch_id, prompts.len());

    let batch = state.processor.enqueue(batch_id, prompts, target).await?;
    Ok((StatusCode::ACCEPTED, Json(BatchAck::from(&batch))))
}

/// `GET /status/{batch_id}`
pub async fn batch_status(
    State(state): State<Arc<AppState>>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchState>, ApiError> {
    debug!("Status request for batch {}", batch_id);
    let batch = state.processor.get_status(&batch_id).await?;
    Ok(Json(batch))
}

/// `POST /stop`
pub async fn stop_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchAck>, ApiError> {
    let request = parse_body(payload)?;
    let batch = state.processor.stop(&request.batch_id).await?;
    Ok(Json(BatchAck::from(&batch)))
}

/// `GET /active`
pub async fn active_batches(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BatchState>>, ApiError> {
    let batches = state.processor.list_active().await?;
    Ok(Json(batches))
}

/// `POST /rewind`
pub async fn rewind_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchAck>, ApiError> {
    let request = parse_body(payload)?;
    let batch = state.processor.rewind(&request.batch_id).await?;
    Ok(Json(BatchAck::from(&batch)))
}

/// `POST /resume`
pub async fn resume_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchAck>, ApiError> {
    let request = parse_body(payload)?;
    let batch = state.processor.resume(&request.batch_id).await?;
    Ok(Json(BatchAck::from(&batch)))
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        active_batches: state.processor.running_count(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime().as_secs(),
    })
}
