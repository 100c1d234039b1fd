//! # AutoPromptr Governor
//!
//! Client-side protection for status polling: a circuit breaker with
//! exponential backoff and a grace period, plus a request governor that
//! de-duplicates concurrent identical requests.

pub mod breaker;
pub mod error;
pub mod failure;
pub mod governor;

pub use breaker::{BreakerSnapshot, BreakerStatus, CircuitBreaker, Decision, Denial, DenialReason};
pub use error::GovernorError;
pub use failure::{FailureKind, RequestFailure};
pub use governor::RequestGovernor;
