//! Rolegate API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;


use rolegate_core::AppError;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, StoreBackend, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let pool = match &config.store_backend {
        StoreBackend::Postgres { database_url } => {
            Some(api_services::connect_and_migrate(database_url).await?)
        }
        StoreBackend::Memory => None,
    };

    if config.migrate_only {
        info!("database migrations applied successfully");
        if let Some(pool) = pool {
            pool.close().await;
        }
        return Ok(());
    }

    let (app_state, rate_limit_service) =
        api_services::build_app_state(&config, pool.as_ref()).await?;
    let cleanup_task = api_services::spawn_rate_limit_cleanup(
        rate_limit_service,
        app_state.gateway.rate_limit_rule().clone(),
    );
    let app = api_router::build_router(app_state, config.max_concurrent_requests);

    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Configuration(format!("failed to bind listener: {error}")))?;

    info!(%address, "rolegate-api listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")));

    cleanup_task.abort();
    if let Some(pool) = pool {
        pool.close().await;
    }
    info!("rolegate-api stopped");

    served
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
