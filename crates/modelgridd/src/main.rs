//! modelgridd — the modelgrid daemon.
//!
//! Single binary that assembles the control plane:
//! - Embedded state store (redb)
//! - Model registry, deployment tracker, experiment log, alert feed
//! - Detection-rule loop (drift / performance / system alerts)
//! - Drain-ramp ticker
//! - REST API
//!
//! # Usage
//!
//! ```text
//! modelgridd standalone --port 8090 --data-dir /var/lib/modelgrid
//! modelgridd standalone --config modelgrid.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use modelgrid_alert::{DetectionRules, Detector};
use modelgrid_core::{ModelgridConfig, epoch_millis};
use modelgrid_deploy::DeploymentTracker;

#[derive(Parser)]
#[command(name = "modelgridd", about = "modelgrid daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all subsystems in one process.
    Standalone {
        /// Optional modelgrid.toml; flags below override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on.
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,modelgridd=debug,modelgrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Standalone {
            config,
            port,
            data_dir,
        } => {
            let mut config = match config {
                Some(path) => ModelgridConfig::from_file(&path)?,
                None => ModelgridConfig::default(),
            };
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir.display().to_string();
            }
            run_standalone(config).await
        }
    }
}

async fn run_standalone(config: ModelgridConfig) -> anyhow::Result<()> {
    info!("modelgrid daemon starting in standalone mode");

    // Ensure data directory exists.
    let data_dir = PathBuf::from(&config.server.data_dir);
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("modelgrid.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let store = modelgrid_state::StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let api_state = modelgrid_api::ApiState::new(store.clone(), config.drain.clone());
    info!("registry, tracker, experiment log, and alert feed initialized");

    let detector = Detector::new(
        store.clone(),
        api_state.alerts.clone(),
        api_state.tracker.clone(),
        DetectionRules {
            accuracy_floor: config.detection.accuracy_floor,
            drift_threshold: config.detection.drift_threshold,
            cpu_high_watermark: config.detection.cpu_high_watermark,
            memory_high_watermark: config.detection.memory_high_watermark,
        },
    );
    info!(
        interval = config.detection.interval_secs,
        "detector initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let detector_shutdown = shutdown_rx.clone();
    let drain_shutdown = shutdown_rx.clone();

    // ── Start background tasks ─────────────────────────────────

    let detect_interval = Duration::from_secs(config.detection.interval_secs);
    let detector_handle = tokio::spawn(async move {
        detector.run(detect_interval, detector_shutdown).await;
    });

    let drain_tracker = api_state.tracker.clone();
    let drain_tick = Duration::from_secs(config.drain.tick_secs);
    let drain_handle = tokio::spawn(async move {
        run_drain_ticker(drain_tracker, drain_tick, drain_shutdown).await;
    });

    // ── Start API server ───────────────────────────────────────

    let router = modelgrid_api::build_router(api_state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = detector_handle.await;
    let _ = drain_handle.await;

    info!("modelgrid daemon stopped");
    Ok(())
}

/// Advance drain ramps until shutdown.
async fn run_drain_ticker(
    tracker: DeploymentTracker,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(tick_secs = tick.as_secs(), "drain ticker started");
    loop {
        tokio::select! {
            _ = tokio::time::sleep(tick) => {
                if let Err(e) = tracker.advance_drains(epoch_millis()) {
                    tracing::warn!(error = %e, "drain tick failed");
                }
            }
            _ = shutdown.changed() => {
                info!("drain ticker shutting down");
                break;
            }
        }
    }
}
