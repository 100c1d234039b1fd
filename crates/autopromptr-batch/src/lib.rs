//! # AutoPromptr Batch
//!
//! Durable, strictly sequential processing of prompt batches.
//!
//! ## Features
//!
//! - Whole-record batch state persisted after every step
//! - Memory, JSON file and SQLite stores
//! - Cooperative stop, rewind and resume after restart
//! - Pluggable prompt executors (simulated or HTTP automation server)

pub mod batch;
pub mod error;
pub mod executor;
pub mod processor;
pub mod recovery;
pub mod store;
pub mod store_sqlite;

pub use batch::{BatchState, BatchStatus, Prompt, PromptResult, PromptStatus, Target};
pub use error::{BatchError, ExecutorError};
pub use executor::{Executor, HttpExecutor, SimulatedExecutor};
pub use processor::{BatchProcessor, RunOutcome};
pub use recovery::{RecoveryManager, RecoveryReport};
pub use store::{BatchStore, FileBatchStore, MemoryBatchStore};
pub use store_sqlite::SqliteBatchStore;
