use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use voxguard_analysis::{Analyzer, LoaderConfig};
use voxguard_server::audit_factory;
use voxguard_server::config::VoxguardConfig;
use voxguard_server::state_factory;
use voxguard_worker::{Worker, WorkerConfig};

/// Voxguard analysis worker.
///
/// Pops job ids from the shared queue and drives each one to a terminal
/// state. Run more instances of this binary to scale horizontally.
#[derive(Parser, Debug)]
#[command(name = "voxguard-worker", about = "Analysis worker for Voxguard")]
struct Cli {
    /// Path to the TOML configuration file (shared with the server).
    #[arg(short, long, default_value = "voxguard.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = VoxguardConfig::load(&cli.config)?;

    let state_pair = state_factory::create_state(&config.state, &config.queue)?;
    info!(backend = state_pair.backend, "state backend initialized");
    if state_pair.backend == "memory" {
        // Still functional for a single-process deployment, but a worker
        // process on the memory backend cannot see the server's queue.
        info!("memory backend is process-local; use redis to share the queue");
    }

    let audit = if config.audit.enabled {
        let store = audit_factory::create_audit_store(&config.audit).await?;
        info!(backend = %config.audit.backend, "audit store initialized");
        Some(store)
    } else {
        None
    };

    let analyzer = Analyzer::new(LoaderConfig {
        target_sample_rate: config.analysis.target_sample_rate,
        min_duration_s: config.analysis.min_duration_s,
        max_duration_s: config.analysis.max_duration_s,
    });

    let worker = Worker::new(
        state_pair.store,
        state_pair.queue,
        audit,
        analyzer,
        WorkerConfig {
            pop_timeout: Duration::from_secs(config.worker.pop_timeout_seconds),
            job_ttl: Duration::from_secs(config.jobs.job_ttl_seconds),
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;
    Ok(())
}
