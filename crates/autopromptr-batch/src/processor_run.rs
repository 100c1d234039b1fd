//! The sequential processing loop.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::ProcessorInner;
use crate::batch::{BatchState, BatchStatus, Prompt, Target};
use crate::error::{BatchError, ExecutorError};

/// Walk the batch from `current_index` to the end.
///
/// Stop requests are honoured only between prompts. Any persistence error
/// halts the run and is returned to the caller.
pub(super) async fn run_batch(
    inner: &ProcessorInner,
    shared: &Arc<Mutex<BatchState>>,
) -> Result<BatchState, BatchError> {
    {
        let mut state = shared.lock().await;
        if state.status == BatchStatus::Stopped {
            return Ok(state.clone());
        }
        state.begin();
        inner.persist(&state).await?;
        info!("Processing batch {} ({} prompts)", state.id, state.total_prompts);
    }

    loop {
        let (index, prompt, target) = {
            let mut state = shared.lock().await;
            if observe_stop(inner, &mut state).await? {
                info!(
                    "Batch {} stopped at prompt {}/{}",
                    state.id, state.current_index, state.total_prompts
                );
                return Ok(state.clone());
            }

            let Some(index) = state.seek_next() else {
                break;
            };
            state.start_prompt(index);
            inner.persist(&state).await?;
            debug!(
                "Batch {}: executing prompt {} ({}/{})",
                state.id,
                state.prompts[index].id,
                index + 1,
                state.total_prompts
            );
            (index, state.prompts[index].clone(), state.target.clone())
        };

        let (outcome, attempts) = execute_with_retry(inner, &prompt, &target).await;

        let more = {
            let mut state = shared.lock().await;
            observe_stop(inner, &mut state).await?;
            match outcome {
                Ok(payload) => {
                    state.complete_prompt(index, payload, attempts);
                    debug!("Batch {}: prompt {} completed", state.id, prompt.id);
                }
                Err(e) => {
                    warn!("Batch {}: prompt {} failed: {}", state.id, prompt.id, e);
                    state.fail_prompt(index, e.to_string(), attempts);
                }
            }
            inner.persist(&state).await?;
            state.status != BatchStatus::Stopped && state.current_index < state.total_prompts
        };

        if more {
            let delay = inner.config.inter_prompt_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    let mut state = shared.lock().await;
    state.finish();
    inner.persist(&state).await?;
    info!(
        "Batch {} {} ({} errors)",
        state.id,
        state.status,
        state.errors.len()
    );
    Ok(state.clone())
}

/// Adopt a stop written to the store by someone other than this process.
///
/// Returns whether the batch is stopped.
async fn observe_stop(inner: &ProcessorInner, state: &mut BatchState) -> Result<bool, BatchError> {
    if state.status == BatchStatus::Stopped {
        return Ok(true);
    }
    match inner.store.load(&state.id).await? {
        Some(stored) if stored.status == BatchStatus::Stopped => {
            state.status = BatchStatus::Stopped;
            state.completed_at = stored.completed_at;
            Ok(true)
        }
        _ => Ok(false),
    }
}

async fn execute_with_retry(
    inner: &ProcessorInner,
    prompt: &Prompt,
    target: &Target,
) -> (Result<Value, ExecutorError>, u32) {
    let max_retries = inner.config.max_prompt_retries;
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match inner.executor.execute_prompt(prompt, target).await {
            Ok(payload) => return (Ok(payload), attempt),
            Err(e) if attempt <= max_retries => {
                let delay = inner.config.retry_delay_for_attempt(attempt - 1);
                warn!(
                    "Prompt {} attempt {}/{} failed: {}. Retrying in {:?}",
                    prompt.id,
                    attempt,
                    max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return (Err(e), attempt),
        }
    }
}

/// Best-effort record of a run halted by an error.
pub(super) async fn record_halt(
    inner: &ProcessorInner,
    shared: &Arc<Mutex<BatchState>>,
    err: &BatchError,
) {
    let mut state = shared.lock().await;
    error!("Batch {} halted: {}", state.id, err);
    state.mark_failed(err.to_string());
    if let Err(save_err) = inner.persist(&state).await {
        error!("Batch {}: could not record failure: {}", state.id, save_err);
    }
}
