//! Startup recovery of unfinished batches.

use tracing::{info, warn};

use crate::error::BatchError;
use crate::processor::BatchProcessor;

/// Resumes batches that were pending or processing when the previous process
/// exited.
pub struct RecoveryManager {
    processor: BatchProcessor,
    auto_resume: bool,
}

impl RecoveryManager {
    /// Create a new recovery manager.
    pub fn new(processor: BatchProcessor, auto_resume: bool) -> Self {
        Self {
            processor,
            auto_resume,
        }
    }

    /// Resume every active batch in the store.
    ///
    /// A batch that cannot be resumed is reported and skipped; only a failure
    /// to list the store is an error.
    pub async fn recover(&self) -> Result<RecoveryReport, BatchError> {
        let mut report = RecoveryReport::default();
        if !self.auto_resume {
            return Ok(report);
        }

        let active = self.processor.list_active().await?;
        if active.is_empty() {
            return Ok(report);
        }

        info!("Recovering {} unfinished batch(es)", active.len());
        for batch in active {
            match self.processor.resume(&batch.id).await {
                Ok(_) => report.resumed.push(batch.id),
                Err(e) => {
                    warn!("Could not resume batch {}: {}", batch.id, e);
                    report.skipped.push((batch.id, e.to_string()));
                }
            }
        }
        Ok(report)
    }
}

/// Result of a recovery sweep.
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// Batches whose processing task was restarted.
    pub resumed: Vec<String>,
    /// Batches left alone, with the reason.
    pub skipped: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use autopromptr_config::ProcessorConfig;

    use crate::batch::{BatchState, BatchStatus, Prompt, Target};
    use crate::executor::SimulatedExecutor;
    use crate::store::{BatchStore, MemoryBatchStore};

    fn config() -> ProcessorConfig {
        ProcessorConfig {
            inter_prompt_delay_ms: 0,
            ..ProcessorConfig::default()
        }
    }

    fn batch(id: &str) -> BatchState {
        BatchState::new(
            id,
            vec![Prompt::new("p0", "hello"), Prompt::new("p1", "world")],
            Target::new("https://bolt.new", "bolt"),
        )
    }

    #[tokio::test]
    async fn test_recover_resumes_active_batches() {
        let store = Arc::new(MemoryBatchStore::new());
        let mut interrupted = batch("interrupted");
        interrupted.begin();
        interrupted.start_prompt(0);
        let mut done = batch("done");
        done.finish();
        store.save(&interrupted).await.unwrap();
        store.save(&batch("queued")).await.unwrap();
        store.save(&done).await.unwrap();

        let processor = BatchProcessor::new(store.clone(), Arc::new(SimulatedExecutor::new()), config());
        let report = RecoveryManager::new(processor.clone(), true)
            .recover()
            .await
            .unwrap();

        assert_eq!(report.resumed.len(), 2);
        assert!(report.skipped.is_empty());

        for id in ["interrupted", "queued"] {
            let final_state = processor.wait(id).await.unwrap();
            assert_eq!(final_state.status, BatchStatus::Completed);
        }
        assert_eq!(
            store.load("done").await.unwrap().unwrap().status,
            BatchStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_recover_disabled() {
        let store = Arc::new(MemoryBatchStore::new());
        store.save(&batch("queued")).await.unwrap();

        let processor = BatchProcessor::new(store.clone(), Arc::new(SimulatedExecutor::new()), config());
        let report = RecoveryManager::new(processor.clone(), false)
            .recover()
            .await
            .unwrap();

        assert!(report.resumed.is_empty());
        assert_eq!(processor.running_count(), 0);
        assert_eq!(
            store.load("queued").await.unwrap().unwrap().status,
            BatchStatus::Pending
        );
    }
}
