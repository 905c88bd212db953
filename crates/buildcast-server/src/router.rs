//! Axum router construction for the Buildcast API.
//!
//! Assembles all routes into a single [`Router`] with CORS and request
//! tracing middleware.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the Buildcast server.
///
/// The router includes:
/// - `GET /` -- minimal HTML page listing the targets
/// - `GET /api/build` -- JSON list of target names
/// - `GET /api/build/{name}` -- viewer (`WebSocket`) or status (plain HTTP)
/// - `GET /api/build/{name}/{parameter}` -- same, with a connection parameter
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/build", get(handlers::list_targets))
        .route("/api/build/{name}", get(handlers::build))
        .route(
            "/api/build/{name}/{parameter}",
            get(handlers::build_with_parameter),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
