pub mod api;
mod banner;
pub mod config;
pub mod error;
pub mod openapi;
pub mod router;
pub mod services;
pub mod state;

pub use banner::print_banner;
pub use config::{Config, ConfigError, Credentials};
pub use error::{AppError, AppResult};
pub use router::create_router;
pub use state::AppState;

pub async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.addr()?;
    tracing::info!("Caching upstream responses in {}", config.cache_dir.display());

    let state = AppState::new(config)?;
    let app = create_router(state);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
