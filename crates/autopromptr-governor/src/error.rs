//! Governor errors.

use thiserror::Error;

use crate::breaker::Denial;
use crate::failure::FailureKind;

/// Outcome of a governed request that did not succeed.
///
/// Clone so that every de-duplicated caller receives the same value.
#[derive(Debug, Clone, Error)]
pub enum GovernorError {
    /// The breaker refused the request; nothing was sent.
    #[error("Request rejected: {0}")]
    Rejected(Denial),

    /// The request was sent and failed.
    #[error("Request failed ({kind}): {message}")]
    Failed { kind: FailureKind, message: String },
}

impl GovernorError {
    pub fn is_rejected(&self) -> bool {
        matches!(self, GovernorError::Rejected(_))
    }
}
