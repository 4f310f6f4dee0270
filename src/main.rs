use std::sync::Arc;

use anyhow::anyhow;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lane_defense_server::config::ServerConfig;
use lane_defense_server::metrics::{self, Metrics};
use lane_defense_server::net::transport::WebSocketServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging (RUST_LOG overrides the default level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Lane Defense Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ServerConfig::load_or_default();
    config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    info!(
        "Configuration loaded: {}:{}, leaderboard={}",
        config.bind_address,
        config.port,
        config.leaderboard_path.display()
    );

    // Initialize metrics
    let metrics = Arc::new(Metrics::new());

    let metrics_clone = metrics.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let server = WebSocketServer::new(config, metrics);
    info!("Server ready on ws://{}", server.bind_addr());

    // Shutdown signal handler
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    };

    // Run server with graceful shutdown
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e);
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    info!("Server stopped");
    Ok(())
}
