//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, a body size limit, and all
//! endpoint handlers.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use callcoach_core::config::CoachConfig;
use callcoach_core::error::CoachError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
///
/// # Arguments
/// * `state` - The shared application state.
///
/// # Returns
/// A fully configured axum Router ready to serve requests.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let max_body = state.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/voice", post(handlers::voice))
        .route("/twilio/transcript", post(handlers::transcript))
        .route("/coach/analyze", post(handlers::analyze))
        .route(
            "/sessions/{call_id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/ws", get(handlers::ws))
        .route("/events", get(handlers::events))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
///
/// Serves until `shutdown` resolves, then lets in-flight requests finish.
pub async fn start_server(
    config: &CoachConfig,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), CoachError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CoachError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(
        "Starting API server on {} (listeners: ws://{}/ws?callId=...)",
        addr,
        addr
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CoachError::Api(format!("Server error: {}", e)))?;

    tracing::info!("API server stopped");
    Ok(())
}
