//! Route definitions for the Coursehub HTTP surface.

use axum::Router;
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let static_dir = state.config.server.static_dir.clone();

    Router::new()
        .route("/", get(handlers::index::index))
        .route("/auth", get(handlers::auth::callback))
        .route("/ws", get(handlers::ws::ws_upgrade))
        .route(
            "/admin/state",
            get(handlers::admin::get_state).post(handlers::admin::set_state),
        )
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
