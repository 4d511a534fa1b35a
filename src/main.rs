//! Overflow LRU - document cache server
//!
//! Serves a variable-weight LRU document cache over HTTP. Pinned documents
//! refuse eviction and push the cache into overflow instead.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use overflow_lru::api::create_router;
use overflow_lru::{spawn_shrink_task, AppState, Config};

/// Main entry point for the document cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Create the sharded cache with configured parameters
/// 4. Start background overflow shrink task
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "overflow_lru=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Overflow LRU Cache Server");

    // Load configuration from environment variables
    let config = Config::from_env().context("failed to read configuration")?;
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: space_limit={}, load_factor={:.3}, shards={}, port={}, shrink_interval={}s",
        config.space_limit,
        config.load_factor,
        config.shard_count,
        config.server_port,
        config.shrink_interval
    );

    // Create application state with the sharded cache
    let state = AppState::from_config(&config).context("failed to build cache")?;
    info!("Cache initialized with {} shards", state.cache.shard_count());

    // Start background shrink task
    let shrink_handle = spawn_shrink_task(state.cache.clone(), config.shrink_interval);
    info!("Background shrink task started");

    // Create router with all endpoints
    let app = create_router(state);

    // Bind to configured port
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shrink_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the shrink task and allows graceful shutdown.
async fn shutdown_signal(shrink_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Abort the shrink task
    shrink_handle.abort();
    warn!("Shrink task aborted");
}
