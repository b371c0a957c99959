use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{health_check, query, root, schema, table_schema, validate, AppState};
use crate::agent::Pipeline;
use crate::config::ServerConfig;

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        // Natural-language queries
        .route("/query", post(query))
        .route("/query/validate", post(validate))
        // Schema introspection
        .route("/schema", get(schema))
        .route("/schema/:table", get(table_schema))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve the API until Ctrl-C
pub async fn run_server(
    config: &ServerConfig,
    pipeline: Arc<Pipeline>,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(pipeline));
    let app = build_router(state);

    let addr: SocketAddr = config.addr().parse()?;
    tracing::info!("Starting SQL pilot server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("SQL pilot server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
