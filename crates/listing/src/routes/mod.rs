//! HTTP route handlers.

pub mod health;
pub mod listing;
pub mod static_files;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(listing::router())
        .merge(health::router())
        .merge(static_files::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
