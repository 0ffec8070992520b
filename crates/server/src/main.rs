//! alcoved - ephemeral two-party chat server
//!
//! Hosts invitation-gated rooms that live entirely in process memory:
//! restart the process and every token, room, and log is gone. That
//! volatility is the point.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alcove_core::ServerConfig;
use alcove_net::Server;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting alcoved");

    let config = load_config();

    let server = match Server::start(config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %server.addr(), "alcoved listening");

    // Run until interrupted
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }

    server.shutdown();
}

/// Configuration file path comes from the first argument or ALCOVE_CONFIG;
/// with neither, built-in defaults apply.
fn load_config() -> ServerConfig {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ALCOVE_CONFIG").ok());

    match path {
        Some(path) => match ServerConfig::load(&path) {
            Ok(config) => {
                tracing::info!(path = %path, "Loaded configuration");
                config
            }
            Err(e) => {
                tracing::error!(path = %path, "Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    }
}
