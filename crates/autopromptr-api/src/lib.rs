//! # AutoPromptr API
//!
//! JSON control surface for the batch processor, and a client for it.
//!
//! - **HTTP**: `/queue`, `/status/{id}`, `/stop`, `/active`, `/rewind`,
//!   `/resume` and `/health` endpoints served with axum
//! - **Client**: [`BatchClient`], whose reads are governed by a shared
//!   circuit breaker

pub mod client;
pub mod error;
pub mod http;
pub mod server;
pub mod state;

pub use client::BatchClient;
pub use error::{ApiError, ClientError, ErrorBody};
pub use http::{
    handlers::{BatchAck, BatchRequest, HealthResponse, PromptInput, QueueRequest},
    routes::create_router,
};
pub use server::ApiServer;
pub use state::AppState;
