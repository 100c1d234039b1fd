//! Batch processor.
//!
//! Each active batch is owned by one tokio task. The task and the control
//! operations share the batch state through a per-run mutex, and every
//! mutation is saved while that mutex is held.
//!
//! Control operations on one batch id (enqueue, resume, stop, rewind) are
//! serialised by a per-id gate, so an idle stop or rewind cannot interleave
//! with a resume that registers a new run.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use autopromptr_config::ProcessorConfig;

use crate::batch::{BatchState, BatchStatus, Prompt, Target};
use crate::error::BatchError;
use crate::executor::Executor;
use crate::store::BatchStore;

#[path = "processor_run.rs"]
mod processor_run;

/// Final outcome of a processing run.
pub type RunOutcome = Result<BatchState, BatchError>;

/// Registry entry for a batch with a live processing task.
struct ActiveRun {
    state: Arc<Mutex<BatchState>>,
    done: watch::Receiver<Option<RunOutcome>>,
}

pub(crate) struct ProcessorInner {
    store: Arc<dyn BatchStore>,
    executor: Arc<dyn Executor>,
    config: ProcessorConfig,
    runs: DashMap<String, ActiveRun>,
    gates: DashMap<String, Arc<Mutex<()>>>,
}

impl ProcessorInner {
    async fn persist(&self, state: &BatchState) -> Result<(), BatchError> {
        self.store.save(state).await
    }

    fn gate(&self, batch_id: &str) -> Arc<Mutex<()>> {
        self.gates
            .entry(batch_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_gate(&self, batch_id: &str, gate: Arc<Mutex<()>>) {
        drop(gate);
        self.gates.remove_if(batch_id, |_, gate| Arc::strong_count(gate) == 1);
    }
}

/// Releases a run's registry slot when its task ends, including by panic.
struct RunGuard {
    inner: Arc<ProcessorInner>,
    batch_id: String,
    done: watch::Sender<Option<RunOutcome>>,
}

impl RunGuard {
    fn finish(self, outcome: RunOutcome) {
        self.inner.runs.remove(&self.batch_id);
        self.done.send_replace(Some(outcome));
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let reported = self.done.borrow().is_some();
        if reported {
            return;
        }
        self.inner.runs.remove(&self.batch_id);
        self.done.send_replace(Some(Err(BatchError::Aborted(format!(
            "processing task for batch {} was cancelled",
            self.batch_id
        )))));
    }
}

/// Sequential batch processor.
///
/// Cloning is cheap and every clone drives the same registry.
#[derive(Clone)]
pub struct BatchProcessor {
    inner: Arc<ProcessorInner>,
}

impl BatchProcessor {
    /// Create a processor over a store and an executor.
    pub fn new(
        store: Arc<dyn BatchStore>,
        executor: Arc<dyn Executor>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ProcessorInner {
                store,
                executor,
                config,
                runs: DashMap::new(),
                gates: DashMap::new(),
            }),
        }
    }

    /// Persist a fresh batch and start processing it.
    ///
    /// Any stored record with the same id is replaced unless it is still
    /// processing.
    pub async fn enqueue(
        &self,
        batch_id: impl Into<String>,
        prompts: Vec<Prompt>,
        target: Target,
    ) -> Result<BatchState, BatchError> {
        let batch_id = batch_id.into();
        if batch_id.trim().is_empty() {
            return Err(BatchError::InvalidRequest("batchId must not be empty".to_string()));
        }
        self.gated(&batch_id, self.enqueue_gated(&batch_id, prompts, target)).await
    }

    async fn enqueue_gated(
        &self,
        batch_id: &str,
        prompts: Vec<Prompt>,
        target: Target,
    ) -> Result<BatchState, BatchError> {
        let batch_id = batch_id.to_string();
        if self.inner.runs.contains_key(&batch_id) {
            return Err(BatchError::AlreadyProcessing(batch_id));
        }
        let existing = self.inner.store.load(&batch_id).await?;
        if existing.is_some_and(|b| b.status == BatchStatus::Processing) {
            return Err(BatchError::AlreadyProcessing(batch_id));
        }

        let state = BatchState::new(batch_id.clone(), prompts, target);
        let (shared, done) = self.register(state.clone())?;
        if let Err(e) = self.inner.persist(&state).await {
            self.inner.runs.remove(&batch_id);
            done.send_replace(Some(Err(e.clone())));
            return Err(e);
        }

        info!(
            "Enqueued batch {} with {} prompts for {}",
            batch_id, state.total_prompts, state.target.platform
        );
        self.spawn(batch_id, shared, done);
        Ok(state)
    }

    /// Start the processing task for a stored pending or interrupted batch.
    pub async fn resume(&self, batch_id: &str) -> Result<BatchState, BatchError> {
        self.gated(batch_id, self.resume_gated(batch_id)).await
    }

    async fn resume_gated(&self, batch_id: &str) -> Result<BatchState, BatchError> {
        if self.inner.runs.contains_key(batch_id) {
            return Err(BatchError::AlreadyProcessing(batch_id.to_string()));
        }

        let mut state = self.load_existing(batch_id).await?;
        if !state.status.is_active() {
            return Err(state.invalid_transition("resume"));
        }

        let reset = state.recover_interrupted();
        if reset > 0 {
            warn!(
                "Batch {}: re-queued {} prompt(s) interrupted mid-execution",
                batch_id, reset
            );
            self.inner.persist(&state).await?;
        }

        let (shared, done) = self.register(state.clone())?;
        info!(
            "Resuming batch {} at prompt {}/{}",
            batch_id, state.current_index, state.total_prompts
        );
        self.spawn(batch_id.to_string(), shared, done);
        Ok(state)
    }

    /// Stop a pending or processing batch.
    ///
    /// An in-flight prompt still finishes and is recorded. The processing task
    /// halts before the next prompt.
    pub async fn stop(&self, batch_id: &str) -> Result<BatchState, BatchError> {
        self.gated(batch_id, self.stop_gated(batch_id)).await
    }

    async fn stop_gated(&self, batch_id: &str) -> Result<BatchState, BatchError> {
        if let Some(shared) = self.active_state(batch_id) {
            let mut state = shared.lock().await;
            state.stop()?;
            self.inner.persist(&state).await?;
            info!("Stop requested for batch {}", batch_id);
            return Ok(state.clone());
        }

        let mut state = self.load_existing(batch_id).await?;
        state.stop()?;
        self.inner.persist(&state).await?;
        info!("Stopped idle batch {}", batch_id);
        Ok(state)
    }

    /// Reset a completed, failed, or stopped batch to pending.
    ///
    /// Does not start processing; call [`resume`](Self::resume) for that.
    ///
    /// Rejected while a processing task still owns the batch, even after a
    /// stop.
    pub async fn rewind(&self, batch_id: &str) -> Result<BatchState, BatchError> {
        self.gated(batch_id, self.rewind_gated(batch_id)).await
    }

    async fn rewind_gated(&self, batch_id: &str) -> Result<BatchState, BatchError> {
        if let Some(shared) = self.active_state(batch_id) {
            let state = shared.lock().await;
            return Err(state.invalid_transition("rewind"));
        }

        let mut state = self.load_existing(batch_id).await?;
        state.rewind()?;
        self.inner.persist(&state).await?;
        info!("Rewound batch {}", batch_id);
        Ok(state)
    }

    /// Current snapshot of a batch.
    pub async fn get_status(&self, batch_id: &str) -> Result<BatchState, BatchError> {
        if let Some(shared) = self.active_state(batch_id) {
            return Ok(shared.lock().await.clone());
        }
        self.load_existing(batch_id).await
    }

    /// All pending or processing batches known to the store.
    pub async fn list_active(&self) -> Result<Vec<BatchState>, BatchError> {
        self.inner.store.list_active().await
    }

    /// Number of batches with a live processing task in this process.
    pub fn running_count(&self) -> usize {
        self.inner.runs.len()
    }

    /// Wait for the processing task of a batch to finish.
    ///
    /// Returns the final state, or the error that halted the run. A batch with
    /// no live task returns its stored state.
    pub async fn wait(&self, batch_id: &str) -> Result<BatchState, BatchError> {
        let done = self
            .inner
            .runs
            .get(batch_id)
            .map(|run| run.done.clone());

        let Some(mut done) = done else {
            return self.load_existing(batch_id).await;
        };

        let outcome = done
            .wait_for(|outcome| outcome.is_some())
            .await
            .ok()
            .and_then(|outcome| (*outcome).clone());

        match outcome {
            Some(result) => result,
            // Sender dropped without reporting.
            None => self.load_existing(batch_id).await,
        }
    }

    /// Wait for every live processing task.
    pub async fn wait_all(&self) {
        let ids: Vec<String> = self.inner.runs.iter().map(|r| r.key().clone()).collect();
        for id in ids {
            if let Err(e) = self.wait(&id).await {
                warn!("Batch {} ended with error: {}", id, e);
            }
        }
    }

    /// Run a control operation while holding the gate for `batch_id`.
    async fn gated<T>(&self, batch_id: &str, op: impl Future<Output = T>) -> T {
        let gate = self.inner.gate(batch_id);
        let output = {
            let _held = gate.lock().await;
            op.await
        };
        self.inner.release_gate(batch_id, gate);
        output
    }

    async fn load_existing(&self, batch_id: &str) -> Result<BatchState, BatchError> {
        self.inner
            .store
            .load(batch_id)
            .await?
            .ok_or_else(|| BatchError::NotFound(batch_id.to_string()))
    }

    fn active_state(&self, batch_id: &str) -> Option<Arc<Mutex<BatchState>>> {
        self.inner.runs.get(batch_id).map(|run| run.state.clone())
    }

    fn register(
        &self,
        state: BatchState,
    ) -> Result<(Arc<Mutex<BatchState>>, watch::Sender<Option<RunOutcome>>), BatchError> {
        match self.inner.runs.entry(state.id.clone()) {
            Entry::Occupied(_) => Err(BatchError::AlreadyProcessing(state.id)),
            Entry::Vacant(slot) => {
                let shared = Arc::new(Mutex::new(state));
                let (tx, rx) = watch::channel(None);
                slot.insert(ActiveRun {
                    state: shared.clone(),
                    done: rx,
                });
                Ok((shared, tx))
            }
        }
    }

    fn spawn(
        &self,
        batch_id: String,
        shared: Arc<Mutex<BatchState>>,
        done: watch::Sender<Option<RunOutcome>>,
    ) {
        let guard = RunGuard {
            inner: self.inner.clone(),
            batch_id,
            done,
        };
        let run = {
            let inner = self.inner.clone();
            let shared = shared.clone();
            tokio::spawn(async move { processor_run::run_batch(&inner, &shared).await })
        };
        tokio::spawn(async move {
            let outcome = run
                .await
                .unwrap_or_else(|join_err| Err(BatchError::Aborted(join_err.to_string())));
            if let Err(e) = &outcome {
                processor_run::record_halt(&guard.inner, &shared, e).await;
            }
            guard.finish(outcome);
        });
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
