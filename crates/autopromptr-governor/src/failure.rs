//! Failure classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a failed request. CORS failures get a fixed long cooldown,
/// the others back off exponentially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Cors,
    Timeout,
    Network,
    Server,
}

impl FailureKind {
    /// Classify an untyped error message.
    ///
    /// Checks run in order: CORS markers, then timeout markers, then any `5`
    /// (taken as a 5xx status), otherwise network.
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        if message.contains("cors")
            || message.contains("access-control")
            || message.contains("failed to fetch")
        {
            FailureKind::Cors
        } else if message.contains("timeout") || message.contains("aborted") {
            FailureKind::Timeout
        } else if message.contains('5') {
            FailureKind::Server
        } else {
            FailureKind::Network
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Cors => "cors",
            FailureKind::Timeout => "timeout",
            FailureKind::Network => "network",
            FailureKind::Server => "server",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed governed request, as reported by the request function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RequestFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cors(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Cors, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Server, message)
    }

    /// Build a failure from a message alone, classifying it textually.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(FailureKind::classify(&message), message)
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure: {}", self.kind, self.message)
    }
}
