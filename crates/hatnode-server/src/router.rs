//! Axum router construction.
//!
//! Only the observe stream has an explicit route. Every other request
//! falls through to [`handlers::dispatch`], which lets the resource tree
//! decide what exists.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router.
///
/// - `GET /ws/{*path}` -- observe a resource over `WebSocket`
/// - anything else -- dispatched as a resource request
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/ws/{*path}", get(ws::observe))
        .fallback(handlers::dispatch)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
