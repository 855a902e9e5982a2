mod api;
mod audit;
mod cache;
mod config;
mod engine;
mod errors;
mod fallback;
mod fga_client;
mod headers;
mod models;
mod openapi;
mod state;
#[cfg(test)]
mod test_utils;

use crate::state::AppState;
use axum::Router;
use log::{error, info};
use std::net::SocketAddr;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load configuration
    let config = match config::GateConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize application state
    let state = match AppState::new(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Using authorization store {} (model {}) at {}",
        config.fga.store_id, config.fga.model_id, config.fga.api_url
    );

    let app = create_app(state).await;

    // Build server address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    // Start server
    let server = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!("Server running on {}, press Ctrl+C to stop", addr);
    let serve = axum::serve(server, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = serve {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

/// Create a new application instance with a given state
pub async fn create_app(state: AppState) -> Router {
    let (openapi_router, api_doc) =
        OpenApiRouter::with_openapi(openapi::ApiDoc::openapi()).split_for_parts();

    Router::new()
        .merge(api::router(&state))
        .merge(openapi_router)
        .merge(Scalar::with_url("/scalar", api_doc))
        .with_state(state)
}

// Simple signal handler that works on all platforms
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
