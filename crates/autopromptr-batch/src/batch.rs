//! Batch and prompt state.
//!
//! `BatchState` is always persisted as a whole record. Every transition below
//! mutates one in-memory value which the caller then saves in full.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BatchError;

/// Batch lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Created, not yet picked up by a processing task.
    #[default]
    Pending,
    /// A processing task is walking the prompts.
    Processing,
    /// Every prompt reached a terminal state.
    Completed,
    /// Processing halted on an unrecoverable error.
    Failed,
    /// Stopped on request.
    Stopped,
}

impl BatchStatus {
    /// Pending or processing.
    pub fn is_active(self) -> bool {
        matches!(self, BatchStatus::Pending | BatchStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-prompt status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PromptStatus {
    /// Completed or failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, PromptStatus::Completed | PromptStatus::Failed)
    }
}

/// One unit of work in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub text: String,
}

impl Prompt {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Where a batch is executed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Target {
    pub url: String,
    pub platform: String,
}

impl Target {
    pub fn new(url: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            platform: platform.into(),
        }
    }
}

/// Outcome of one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResult {
    pub prompt_id: String,
    pub status: PromptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Executor payload, only set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure message, only set on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Executor calls made for this prompt.
    #[serde(default)]
    pub attempts: u32,
}

impl PromptResult {
    pub fn pending(prompt_id: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            status: PromptStatus::Pending,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            attempts: 0,
        }
    }
}

/// Durable state of one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchState {
    pub id: String,
    pub status: BatchStatus,
    /// Index of the prompt executing or next to execute.
    pub current_index: usize,
    pub total_prompts: usize,
    /// Index-aligned with `prompts`.
    pub results: Vec<PromptResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub prompts: Vec<Prompt>,
    pub target: Target,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BatchState {
    /// Create a pending batch with one pending result per prompt.
    pub fn new(id: impl Into<String>, prompts: Vec<Prompt>, target: Target) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: BatchStatus::Pending,
            current_index: 0,
            total_prompts: prompts.len(),
            results: prompts.iter().map(|p| PromptResult::pending(&p.id)).collect(),
            started_at: None,
            completed_at: None,
            errors: Vec::new(),
            prompts,
            target,
            created_at: now,
            updated_at: now,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Move into `processing`. `started_at` keeps its first value across
    /// resumes.
    pub fn begin(&mut self) {
        self.status = BatchStatus::Processing;
        self.started_at.get_or_insert_with(Utc::now);
        self.touch();
    }

    /// Reset prompts left `processing` by an interrupted run.
    ///
    /// Returns how many prompts were reset.
    pub fn recover_interrupted(&mut self) -> usize {
        let mut reset = 0;
        for result in &mut self.results {
            if result.status == PromptStatus::Processing {
                result.status = PromptStatus::Pending;
                result.started_at = None;
                reset += 1;
            }
        }
        if reset > 0 {
            self.touch();
        }
        reset
    }

    /// Advance `current_index` past terminal results and return the next
    /// prompt to run, if any.
    pub fn seek_next(&mut self) -> Option<usize> {
        while self.current_index < self.total_prompts
            && self.results[self.current_index].status.is_terminal()
        {
            self.current_index += 1;
        }
        (self.current_index < self.total_prompts).then_some(self.current_index)
    }

    /// Mark the prompt at `index` as processing.
    pub fn start_prompt(&mut self, index: usize) {
        let result = &mut self.results[index];
        result.status = PromptStatus::Processing;
        result.started_at = Some(Utc::now());
        self.touch();
    }

    /// Record a successful prompt and move past it.
    pub fn complete_prompt(&mut self, index: usize, payload: serde_json::Value, attempts: u32) {
        let result = &mut self.results[index];
        result.status = PromptStatus::Completed;
        result.completed_at = Some(Utc::now());
        result.result = Some(payload);
        result.attempts = attempts;
        self.advance_past(index);
    }

    /// Record a failed prompt, log the error on the batch, and move past it.
    pub fn fail_prompt(&mut self, index: usize, message: impl Into<String>, attempts: u32) {
        let message = message.into();
        let result = &mut self.results[index];
        result.status = PromptStatus::Failed;
        result.completed_at = Some(Utc::now());
        result.error = Some(message.clone());
        result.attempts = attempts;
        self.errors.push(message);
        self.advance_past(index);
    }

    fn advance_past(&mut self, index: usize) {
        self.current_index = self.current_index.max(index + 1);
        self.touch();
    }

    /// Close the batch after the last prompt. A stopped batch keeps its
    /// status and `completed_at`.
    pub fn finish(&mut self) {
        if self.status == BatchStatus::Stopped {
            return;
        }
        self.status = BatchStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    /// Stop the batch. Only pending or processing batches can be stopped.
    pub fn stop(&mut self) -> Result<(), BatchError> {
        if !self.status.is_active() {
            return Err(self.invalid_transition("stop"));
        }
        self.status = BatchStatus::Stopped;
        self.completed_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Record a fatal processing error.
    ///
    /// A stopped batch keeps its status and `completed_at`; only the error is
    /// appended.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        if self.status != BatchStatus::Stopped {
            self.status = BatchStatus::Failed;
            self.completed_at = Some(Utc::now());
        }
        self.touch();
    }

    /// Reset a finished batch to a fresh pending run.
    pub fn rewind(&mut self) -> Result<(), BatchError> {
        if self.status.is_active() {
            return Err(self.invalid_transition("rewind"));
        }
        self.status = BatchStatus::Pending;
        self.current_index = 0;
        self.results = self.prompts.iter().map(|p| PromptResult::pending(&p.id)).collect();
        self.errors.clear();
        self.started_at = None;
        self.completed_at = None;
        self.touch();
        Ok(())
    }

    pub(crate) fn invalid_transition(&self, action: &'static str) -> BatchError {
        BatchError::InvalidTransition {
            id: self.id.clone(),
            from: self.status,
            action,
        }
    }

    /// Number of results currently `processing`.
    pub fn processing_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == PromptStatus::Processing)
            .count()
    }

    /// Number of prompts in a terminal state.
    pub fn finished_count(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_terminal()).count()
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
