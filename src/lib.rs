pub mod error;
pub mod models;
pub mod modules;
pub mod proxy; // Proxy service module
pub mod utils;

use modules::logger;
use tracing::{error, info, warn};

/// Load configuration, start the server and run until Ctrl-C
pub async fn run() -> anyhow::Result<()> {
    let config = modules::config::load_app_config()?;

    // Keep the guard for the whole process so file logs flush on exit
    let _log_guard = logger::init_logger(config.log_dir.as_deref());

    info!("API Proxy Service starting on port {}", config.port);
    info!("Health check: http://localhost:{}/health", config.port);
    info!("API endpoint: http://localhost:{}/api/lookup", config.port);
    match &config.external_api.url {
        Some(url) => info!("External API: {}", url),
        None => warn!("EXTERNAL_API_URL not configured, /api/lookup will answer 500"),
    }
    if config.external_api.api_key.is_none() {
        warn!("No external API key configured");
    }
    info!(
        "Bolagsverket environment: {} (credentials {})",
        config.bolagsverket.environment.as_str(),
        if config.bolagsverket.has_credentials() {
            "SET"
        } else {
            "MISSING"
        }
    );

    let state = proxy::AppState::from_config(config)?;
    let (server, handle) = proxy::AxumServer::start(state).await?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            server.stop();
        }
        res = handle => {
            if let Err(e) = res {
                error!("Server task ended unexpectedly: {}", e);
            }
        }
    }

    Ok(())
}
