#![forbid(unsafe_code)]

//! `pool-warden` supervisor binary.
//!
//! Loads configuration, provisions and launches the worker pool, then runs
//! the health-check loop and the connected-client publisher until shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use pool_warden::config::GlobalConfig;
use pool_warden::metrics::{self, MetricsSink, RedisSink};
use pool_warden::models::WorkerTable;
use pool_warden::orchestrator::{
    spawn_health_loop, Collaborators, HealthOrchestrator, Provisioner, RandomSnapshot,
    ShellProcessControl,
};
use pool_warden::probe::StatusPing;
use pool_warden::router::LocalRouter;
use pool_warden::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "pool-warden", about = "Game-server worker pool supervisor", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("pool-warden bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.load_credentials()?;
    let config = Arc::new(config);
    info!(pool = config.pool_size(), "configuration loaded");

    // ── Provision and launch the pool ───────────────────
    let provisioner = Arc::new(Provisioner::new(
        config.paths.clone(),
        Arc::new(RandomSnapshot),
    ));
    let orchestrator = HealthOrchestrator::new(
        WorkerTable::from_config(&config),
        Collaborators {
            provisioner,
            process: Arc::new(ShellProcessControl::new(config.launch.clone())),
            prober: Arc::new(StatusPing),
            router: Arc::new(LocalRouter::new()),
        },
        config.probe_timeout(),
        config.restart_guard_ttl(),
    );

    let registered = orchestrator.bootstrap().await;
    if registered < config.pool_size() {
        warn!(
            registered,
            pool = config.pool_size(),
            "pool started incomplete; logins stay gated"
        );
    }

    // ── Start background services ───────────────────────
    let ct = CancellationToken::new();
    let health_handle = spawn_health_loop(
        Arc::clone(&orchestrator),
        config.health_interval(),
        ct.clone(),
    );
    info!("health-check loop started");

    let metrics_handle = match (&config.metrics.sink, config.metrics.enabled) {
        (Some(credentials), true) => {
            let sink: Arc<dyn MetricsSink> = Arc::new(RedisSink::new(credentials)?);
            info!(key = %config.metrics.key, "metrics publisher started");
            Some(metrics::spawn_metrics_publisher(
                Arc::clone(&orchestrator),
                sink,
                config.metrics.key.clone(),
                config.metrics_interval(),
                ct.clone(),
            ))
        }
        _ => {
            info!("metrics publisher disabled");
            None
        }
    };

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = health_handle.await;
    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }
    info!("pool-warden shut down");

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
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
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
