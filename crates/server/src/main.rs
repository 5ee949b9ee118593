use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soulbridge_core::{
    config_path, create_authenticator, load_config, validate_config, Authenticator, SlskdApi,
    SlskdClient,
};
use soulbridge_server::{create_router, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = config_path();

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Auth method: {:?}", config.auth.method);
    info!("slskd: {}", config.slskd.url);

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    // Create slskd client
    let slskd: Arc<dyn SlskdApi> =
        Arc::new(SlskdClient::new(&config.slskd).context("Failed to create slskd client")?);

    let state = Arc::new(AppState::new(config.clone(), authenticator, slskd));

    // Periodic cache sweep
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_handle = tokio::spawn(sweep_caches(
        Arc::clone(&state),
        Duration::from_secs(config.search.sweep_interval_secs.max(1)),
        shutdown_rx,
    ));

    // Create router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    let _ = shutdown_tx.send(true);
    let _ = sweep_handle.await;

    let abandoned = state.tracker().len().await;
    if abandoned > 0 {
        info!(jobs = abandoned, "Tracked download jobs are not persisted and will be forgotten");
    }

    Ok(())
}

/// Remove expired search results until shutdown.
async fn sweep_caches(state: Arc<AppState>, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = state.search().sweep().await;
                if removed > 0 {
                    debug!(removed, "Swept expired cache entries");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
