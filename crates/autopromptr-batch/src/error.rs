//! Batch processing errors.

use thiserror::Error;

use crate::batch::BatchStatus;

/// Batch error types.
#[derive(Debug, Clone, Error)]
pub enum BatchError {
    /// No batch with this id.
    #[error("Batch not found: {0}")]
    NotFound(String),

    /// A processing task already runs this batch.
    #[error("Batch is already processing: {0}")]
    AlreadyProcessing(String),

    /// The requested operation is not valid from the current status.
    #[error("Cannot {action} batch {id} while it is {from}")]
    InvalidTransition {
        id: String,
        from: BatchStatus,
        action: &'static str,
    },

    /// The batch store failed to read or write.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The executor could not be constructed or reached.
    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    /// Malformed request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The processing task ended without reporting an outcome.
    #[error("Processing aborted: {0}")]
    Aborted(String),
}

impl BatchError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BatchError::NotFound(_) => "not_found",
            BatchError::AlreadyProcessing(_) => "already_processing",
            BatchError::InvalidTransition { .. } => "invalid_transition",
            BatchError::Persistence(_) => "persistence",
            BatchError::Executor(_) => "executor",
            BatchError::InvalidRequest(_) => "invalid_request",
            BatchError::Aborted(_) => "aborted",
        }
    }
}

/// Prompt execution errors.
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    /// The automation reported a failure.
    #[error("Execution failed: {0}")]
    Failed(String),

    /// The automation endpoint answered with a non-success status.
    #[error("Automation endpoint returned {status}: {message}")]
    Http { status: u16, message: String },

    /// No answer within the deadline.
    #[error("Execution timed out after {0}s")]
    Timeout(u64),

    /// Transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The response body could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
