//! Thin HTTP glue over the orchestrator and storage.
//!
//! Handlers only translate JSON to and from pipeline calls; no pipeline
//! logic lives here.

mod handlers;

pub use handlers::*;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::pipeline::Orchestrator;
use crate::storage::Storage;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    /// The pipeline controller.
    pub orchestrator: Arc<Orchestrator>,
    /// History, feedback, and profile persistence.
    pub storage: Arc<dyn Storage>,
}

/// Build the application router
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/connect", post(handlers::connect))
        .route("/api/profile", get(handlers::get_profile))
        .route("/api/profile", post(handlers::set_profile))
        .route("/api/feedback", post(handlers::feedback))
        .route("/api/fairness", get(handlers::fairness))
        .route("/api/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Run the HTTP server until shutdown
pub async fn run(addr: SocketAddr, ctx: AppContext) -> std::io::Result<()> {
    let app = router(ctx);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");
    axum::serve(listener, app).await
}
