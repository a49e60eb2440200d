//! scoutsync - Field Synchronization Server
//!
//! Accepts scouting tablet connections over the framed wire protocol and
//! gateways their records into a remote store, caching locally and queueing
//! writes while the remote is unreachable.

use scoutsync_gateway::{CacheDir, Gateway, GatewayConfig, HttpRemote, RemoteConfig};
use scoutsync_server::{Category, Config, Dispatcher, Server, ServerConfig, TcpAcceptor};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if SCOUTSYNC_CONFIG is set, then env overrides)
    let config = match Config::load() {
        Ok(c) => {
            if let Ok(path) = std::env::var("SCOUTSYNC_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if std::env::var("SCOUTSYNC_CONFIG").is_ok() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            // Otherwise fall back to defaults
            tracing::info!("Using default configuration");
            Config::default()
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    tracing::info!("Starting scoutsync server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Event: {}", config.remote.event);
    tracing::info!("  Remote store: {}", config.remote.base_url);

    // Create the per-event cache directory
    let cache_root = config.cache.root_for(&config.remote.event);
    std::fs::create_dir_all(&cache_root)?;
    tracing::info!("  Cache directory: {}", cache_root.display());

    let cache = CacheDir::open(&cache_root)?;
    if !cache.is_empty() {
        tracing::info!("  Cached records found: {}", cache.len());
    }

    // Remote store adapter and gateway
    let remote = HttpRemote::new(
        RemoteConfig::new(&config.remote.base_url, &config.remote.event)
            .with_request_timeout(config.remote.request_timeout()),
    )?;
    let gateway = Arc::new(Gateway::new(
        cache,
        Arc::new(remote),
        GatewayConfig::default().with_attempts(config.remote.attempts),
    ));

    // Wire tag dispatch table
    let categories = config
        .categories
        .iter()
        .map(Category::from_config)
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!(
        "  Categories: {}",
        config
            .categories
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let dispatcher = Dispatcher::new(gateway.clone(), categories);
    let server = Arc::new(Server::new(
        ServerConfig {
            max_connections: config.network.max_connections,
        },
        dispatcher,
    ));

    let acceptor = TcpAcceptor::bind(config.network.bind_addr).await?;

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run(acceptor).await?;

    // Queued writes live in memory only and are lost on exit
    let queued = gateway.queued_writes().await;
    if queued > 0 {
        tracing::warn!(
            "Exiting with {} queued write(s) that never reached the remote store; \
             the cache under {} still holds the data",
            queued,
            cache_root.display()
        );
    }

    tracing::info!("Server stopped");
    Ok(())
}
