//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub processor: ProcessorConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub governor: GovernorConfig,

    #[serde(default)]
    pub client: ClientConfig,
}

/// Control surface listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Batch processor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Pause between two prompts of the same batch, in milliseconds.
    #[serde(default = "default_inter_prompt_delay")]
    pub inter_prompt_delay_ms: u64,

    /// Extra attempts for a failed prompt before it is recorded as failed.
    /// Zero disables per-prompt retry.
    #[serde(default)]
    pub max_prompt_retries: u32,

    /// First retry delay in milliseconds; doubles on every further attempt.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Upper bound for the retry delay in milliseconds.
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,

    /// Resume pending and interrupted batches on startup.
    #[serde(default = "default_auto_resume")]
    pub auto_resume: bool,
}

impl ProcessorConfig {
    pub fn inter_prompt_delay(&self) -> Duration {
        Duration::from_millis(self.inter_prompt_delay_ms)
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn retry_delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .retry_base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay.min(self.retry_max_delay_ms))
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            inter_prompt_delay_ms: default_inter_prompt_delay(),
            max_prompt_retries: 0,
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            auto_resume: default_auto_resume(),
        }
    }
}

fn default_inter_prompt_delay() -> u64 {
    2000
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_retry_max_delay() -> u64 {
    30_000
}

fn default_auto_resume() -> bool {
    true
}

/// Persistence backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map, lost on restart.
    Memory,
    /// One JSON file per batch.
    #[default]
    File,
    /// SQLite database, one row per batch.
    Sqlite,
}

/// Batch store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory for the file backend, or database file for SQLite.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".autopromptr").join("batches"))
        .unwrap_or_else(|| PathBuf::from("/tmp/autopromptr/batches"))
}

/// Which executor runs prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Returns a synthetic payload without touching the network.
    #[default]
    Simulated,
    /// Calls the browser automation server over HTTP.
    Http,
}

/// Executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub kind: ExecutorKind,

    /// Base URL of the automation server.
    #[serde(default = "default_automation_url")]
    pub automation_url: String,

    /// Per-prompt request timeout in seconds.
    #[serde(default = "default_executor_timeout")]
    pub timeout_secs: u64,

    /// Ask the automation server to wait for network idle before typing.
    #[serde(default = "default_wait_for_idle")]
    pub wait_for_idle: bool,

    /// Retries performed by the automation server itself.
    #[serde(default = "default_server_retries")]
    pub server_retries: u32,
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            kind: ExecutorKind::default(),
            automation_url: default_automation_url(),
            timeout_secs: default_executor_timeout(),
            wait_for_idle: default_wait_for_idle(),
            server_retries: default_server_retries(),
        }
    }
}

fn default_automation_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_executor_timeout() -> u64 {
    60
}

fn default_wait_for_idle() -> bool {
    true
}

fn default_server_retries() -> u32 {
    3
}

/// Circuit breaker and request governor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Consecutive failures before the breaker opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Backoff at level 0 in milliseconds.
    #[serde(default = "default_base_backoff")]
    pub base_backoff_ms: u64,

    /// Ceiling for exponential backoff in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Fixed cooldown after CORS failures in milliseconds.
    #[serde(default = "default_cors_backoff")]
    pub cors_backoff_ms: u64,

    /// Highest backoff level.
    #[serde(default = "default_max_backoff_level")]
    pub max_backoff_level: u32,

    /// Cumulative failures that trigger the grace period.
    #[serde(default = "default_grace_failure_count")]
    pub grace_failure_count: u32,

    /// Grace period length in milliseconds.
    #[serde(default = "default_grace_period")]
    pub grace_period_ms: u64,

    /// Timeout for a single governed request in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Upper bound of the random delay before a governed request.
    #[serde(default = "default_jitter_max")]
    pub jitter_max_ms: u64,
}

impl GovernorConfig {
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn cors_backoff(&self) -> Duration {
        Duration::from_millis(self.cors_backoff_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn jitter_max(&self) -> Duration {
        Duration::from_millis(self.jitter_max_ms)
    }
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            base_backoff_ms: default_base_backoff(),
            max_backoff_ms: default_max_backoff(),
            cors_backoff_ms: default_cors_backoff(),
            max_backoff_level: default_max_backoff_level(),
            grace_failure_count: default_grace_failure_count(),
            grace_period_ms: default_grace_period(),
            request_timeout_ms: default_request_timeout(),
            jitter_max_ms: default_jitter_max(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    2
}

fn default_base_backoff() -> u64 {
    30_000
}

fn default_max_backoff() -> u64 {
    1_800_000
}

fn default_cors_backoff() -> u64 {
    1_800_000
}

fn default_max_backoff_level() -> u32 {
    5
}

fn default_grace_failure_count() -> u32 {
    3
}

fn default_grace_period() -> u64 {
    3_600_000
}

fn default_request_timeout() -> u64 {
    15_000
}

fn default_jitter_max() -> u64 {
    1_000
}

/// Client-side settings used by the CLI commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of a running control surface.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Poll interval for `watch`, in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl ClientConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_poll_interval() -> u64 {
    2000
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
