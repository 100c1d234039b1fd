//! Application state.

use std::time::Instant;

use autopromptr_batch::BatchProcessor;

/// Application state shared across handlers.
pub struct AppState {
    pub processor: BatchProcessor,
    start_time: Instant,
}

impl AppState {
    pub fn new(processor: BatchProcessor) -> Self {
        Self {
            processor,
            start_time: Instant::now(),
        }
    }

    /// Get uptime.
    pub fn uptime(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}
