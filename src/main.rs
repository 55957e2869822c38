// meetline - meeting status service
// Main entry point for the HTTP server

use log::{error, info, warn};
use meetline::api::ApiServer;
use meetline::config::{validate_config, Config};
use meetline::utils::logging;
use meetline::{AppState, CallProvider, Database, StreamCallProvider};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("Starting meetline v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run().await {
        logging::log_error_with_context(&e, "startup");
        eprintln!("meetline failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    validate_config(&config)?;

    let db = Arc::new(Database::open(&config.database_url).await?);

    let provider: Option<Arc<dyn CallProvider>> = match &config.stream {
        Some(stream) => {
            let client = StreamCallProvider::new(stream.clone(), config.provider_timeout).await?;
            Some(Arc::new(client) as Arc<dyn CallProvider>)
        }
        None => {
            warn!("Continuing without a call provider - meeting creation is disabled");
            None
        }
    };

    let state = AppState::new(db, provider, &config)?;
    let shutdown = state.shutdown.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    ApiServer::new(&config.bind_addr, state).start().await
}
