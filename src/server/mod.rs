//! HTTP server module for API and WebSocket endpoints.
//!
//! Provides the share/onboard REST API and the WebSocket feed of live
//! location updates.

pub mod routes;
pub mod state;
pub mod ws;

use crate::server::routes::{health, onboard, share};
use crate::server::state::AppState;
use crate::server::ws::ws_handler;

use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    // CORS layer for mobile and web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Journeys API
        .route("/share", post(share::share))
        .route("/onboard", get(onboard::get_onboard))
        // WebSocket
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Runs the axum server until `shutdown` resolves.
pub async fn run_server(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
