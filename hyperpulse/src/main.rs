use std::time::Duration;

use hyperpulse::api::ApiServer;
use hyperpulse::config::AppConfig;
use hyperpulse::services::ServiceContainer;
use hyperpulse::utils::http_client;
use hyperpulse::{logging, panic_hook};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env_or_default();

    // Initialize logging; the guard flushes the file writer on drop
    let (logging_config, _log_guard) = logging::init_logging(&config.log_dir)?;
    panic_hook::install(&config.log_dir);
    http_client::install_rustls_provider();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        history = config.history_enabled(),
        "Starting hyperpulse"
    );

    let container = ServiceContainer::new(&config).await?;
    container.start();
    logging_config.start_retention_cleanup(container.cancellation_token());

    let server = ApiServer::with_state(
        config.api.clone(),
        container.app_state(Some(logging_config.clone())),
    );
    let server_token = server.cancel_token();

    let server_task = tokio::spawn(async move { server.run().await });
    let shutdown_token = container.cancellation_token();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        }
        _ = shutdown_token.cancelled() => {}
    }

    server_token.cancel();
    match tokio::time::timeout(Duration::from_secs(10), server_task).await {
        Ok(Ok(Err(e))) => tracing::error!("API server error: {}", e),
        Ok(Err(e)) => tracing::error!("API server task panicked: {}", e),
        Err(_) => tracing::warn!("API server did not stop within 10s"),
        Ok(Ok(Ok(()))) => {}
    }

    container.shutdown().await;
    tracing::info!("hyperpulse stopped");
    Ok(())
}
