use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use voxguard_server::admission::{AdmissionConfig, AdmissionService};
use voxguard_server::api::{self, AppState};
use voxguard_server::audit_factory;
use voxguard_server::config::VoxguardConfig;
use voxguard_server::ratelimit::RateLimiter;
use voxguard_server::state_factory;

/// Voxguard admission HTTP server.
#[derive(Parser, Debug)]
#[command(name = "voxguard-server", about = "Admission HTTP server for Voxguard")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "voxguard.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber from RUST_LOG or default to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = VoxguardConfig::load(&cli.config)?;

    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);
    let max_upload_bytes = config.server.max_upload_bytes;

    // Backends are chosen exactly once, here.
    let state_pair = state_factory::create_state(&config.state, &config.queue)?;
    info!(backend = state_pair.backend, "state backend initialized");

    let audit = if config.audit.enabled {
        let store = audit_factory::create_audit_store(&config.audit).await?;
        info!(backend = %config.audit.backend, "audit store initialized");
        Some(store)
    } else {
        None
    };

    let limiter = config
        .rate_limit
        .enabled
        .then(|| RateLimiter::new(Arc::clone(&state_pair.store), config.rate_limit));

    let admission = AdmissionService::new(
        Arc::clone(&state_pair.store),
        Arc::clone(&state_pair.queue),
        limiter,
        AdmissionConfig {
            max_upload_bytes,
            job_ttl: Duration::from_secs(config.jobs.job_ttl_seconds),
            audio_ttl: Duration::from_secs(config.jobs.audio_ttl_seconds),
        },
    );

    let app = api::router(AppState {
        admission: Arc::new(admission),
        audit,
        backend: state_pair.backend,
        max_upload_bytes,
    });

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!(host = %host, port, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
