//! Server bootstrap: tracing, store, executor, recovery and control surface.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use autopromptr_api::{ApiServer, AppState};
use autopromptr_batch::{
    BatchProcessor, BatchStore, Executor, FileBatchStore, HttpExecutor, MemoryBatchStore,
    RecoveryManager, SimulatedExecutor, SqliteBatchStore,
};
use autopromptr_config::{
    Config, ConfigLoader, ExecutorConfig, ExecutorKind, StoreBackend, StoreConfig,
};

/// Get the .autopromptr directory path.
pub(crate) fn autopromptr_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".autopromptr"))
        .unwrap_or_else(|| PathBuf::from(".autopromptr"))
}

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.autopromptr/debug/ with daily rotation.
pub(crate) fn init_tracing() -> anyhow::Result<()> {
    let log_dir = autopromptr_dir().join("debug");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("autopromptr")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes the file writer on drop, so it must outlive main.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Run the batch processor and control surface in foreground.
pub(crate) async fn run_server(config: Config) -> anyhow::Result<()> {
    info!("Starting AutoPromptr v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config.store).await?;
    let executor = build_executor(&config.executor)?;
    let processor = BatchProcessor::new(store, executor, config.processor.clone());

    let report = RecoveryManager::new(processor.clone(), config.processor.auto_resume)
        .recover()
        .await
        .context("Recovery sweep failed")?;
    if !report.resumed.is_empty() {
        info!("Resumed {} batch(es): {}", report.resumed.len(), report.resumed.join(", "));
    }
    for (id, reason) in &report.skipped {
        warn!("Left batch {} untouched: {}", id, reason);
    }

    let state = Arc::new(AppState::new(processor.clone()));
    let server = ApiServer::new(config.server.clone(), state);

    info!("AutoPromptr ready:");
    info!("  Control surface: http://{}", server.addr());
    info!("  POST /queue          - queue a batch");
    info!("  GET  /status/{{id}}    - batch state");
    info!("  POST /stop           - stop a batch");
    info!("  GET  /active         - unfinished batches");
    info!("  POST /rewind         - reset a finished batch");
    info!("  POST /resume         - resume a batch");
    info!("  GET  /health         - health check");

    server.run(shutdown_signal()).await?;

    let running = processor.running_count();
    if running > 0 {
        info!("{} batch(es) still processing; they resume on next start", running);
    }
    info!("Shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn build_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn BatchStore>> {
    let path = PathBuf::from(ConfigLoader::expand_path(&config.path.to_string_lossy()));
    let store: Arc<dyn BatchStore> = match config.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory batch store; batches are lost on restart");
            Arc::new(MemoryBatchStore::new())
        }
        StoreBackend::File => {
            info!("Batch store: files under {}", path.display());
            Arc::new(FileBatchStore::new(&path).await?)
        }
        StoreBackend::Sqlite => {
            let db_path = sqlite_path(&path);
            info!("Batch store: SQLite at {}", db_path.display());
            Arc::new(SqliteBatchStore::open(&db_path).await?)
        }
    };
    Ok(store)
}

/// A store path without an extension names a directory holding `batches.db`.
fn sqlite_path(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.join("batches.db")
    }
}

fn build_executor(config: &ExecutorConfig) -> anyhow::Result<Arc<dyn Executor>> {
    let executor: Arc<dyn Executor> = match config.kind {
        ExecutorKind::Simulated => {
            info!("Executor: simulated");
            Arc::new(SimulatedExecutor::new())
        }
        ExecutorKind::Http => {
            info!("Executor: automation server at {}", config.automation_url);
            Arc::new(HttpExecutor::new(config)?)
        }
    };
    Ok(executor)
}
