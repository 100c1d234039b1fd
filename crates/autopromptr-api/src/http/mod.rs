//! HTTP control surface.
//!
//! Provides JSON endpoints for queueing batches, querying progress and
//! driving the batch lifecycle (stop, rewind, resume).

pub mod handlers;
pub mod routes;
