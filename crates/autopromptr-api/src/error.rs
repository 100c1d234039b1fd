//! API and client error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use autopromptr_batch::BatchError;
use autopromptr_governor::{Denial, FailureKind, GovernorError};

/// Server-side error, rendered as `{"error": message, "kind": kind}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Error from the batch processor.
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// The request body could not be parsed or failed validation.
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Batch(BatchError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Batch(BatchError::AlreadyProcessing(_))
            | ApiError::Batch(BatchError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            ApiError::Batch(BatchError::InvalidRequest(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Batch(BatchError::Executor(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Batch(BatchError::Persistence(_))
            | ApiError::Batch(BatchError::Aborted(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Batch(e) => e.kind(),
            ApiError::BadRequest(_) => "invalid_request",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (
            status,
            Json(json!({
                "error": self.to_string(),
                "kind": self.kind(),
            })),
        )
            .into_response()
    }
}

/// Error body returned by the control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub kind: String,
}

/// Client-side error.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The circuit breaker refused to send the request.
    #[error("Request rejected: {0}")]
    Rejected(Denial),

    /// The request did not get a usable answer.
    #[error("Transport error ({kind}): {message}")]
    Transport { kind: FailureKind, message: String },

    /// The server answered with an error body.
    #[error("Server returned {status}: {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The configured base URL cannot carry request paths.
    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    pub(crate) fn api(status: u16, body: ErrorBody) -> Self {
        ClientError::Api {
            status,
            kind: body.kind,
            message: body.error,
        }
    }
}

impl From<GovernorError> for ClientError {
    fn from(err: GovernorError) -> Self {
        match err {
            GovernorError::Rejected(denial) => ClientError::Rejected(denial),
            GovernorError::Failed { kind, message } => ClientError::Transport { kind, message },
        }
    }
}
