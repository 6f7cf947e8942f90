#![forbid(unsafe_code)]

//! `focus-orchestrator` — analysis session supervisor binary.
//!
//! Bootstraps configuration and logging, builds the session controller, and
//! serves `focus-ctl` commands over local IPC until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use focus_orchestrator::audit::{AuditLogger, JsonlAuditWriter};
use focus_orchestrator::config::GlobalConfig;
use focus_orchestrator::ipc::server;
use focus_orchestrator::orchestrator::SessionController;
use focus_orchestrator::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "focus-orchestrator", about = "Analysis session supervisor", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the analysis engine root directory.
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("focus-orchestrator bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(work_dir) = args.work_dir {
        config.override_work_dir(&work_dir)?;
    }
    info!(
        runtime = %config.engine.runtime,
        work_dir = %config.engine.work_dir.display(),
        "configuration loaded"
    );

    // ── Audit log ───────────────────────────────────────
    let audit: Option<Arc<dyn AuditLogger>> = match config.diagnostics.audit_dir.clone() {
        Some(dir) => Some(Arc::new(JsonlAuditWriter::new(dir)?)),
        None => {
            info!("audit log disabled");
            None
        }
    };

    let controller = Arc::new(SessionController::new(&config, audit));

    // ── Start IPC server ────────────────────────────────
    let ct = CancellationToken::new();
    let ipc_handle =
        server::spawn_ipc_server(config.ipc_name.clone(), Arc::clone(&controller), ct.clone())?;
    info!("focus-orchestrator ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let deadline = config.timeouts.stop_grace() + config.timeouts.drain();
    if !controller.shutdown(deadline).await {
        warn!("exiting with a session still terminating");
    }

    if let Err(err) = ipc_handle.await {
        error!(%err, "ipc server task failed");
    }
    info!("focus-orchestrator shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
