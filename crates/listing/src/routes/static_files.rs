//! Client script serving.
//!
//! The facet synchronization script is compiled into the binary so the
//! listing pages work without a static directory on disk.

use axum::{
    Router,
    http::header,
    response::IntoResponse,
    routing::get,
};

use crate::state::AppState;

const FACETED_LISTING_JS: &str = include_str!("../../static/faceted-listing.js");

/// Create the static files router.
pub fn router() -> Router<AppState> {
    Router::new().route("/static/faceted-listing.js", get(serve_script))
}

async fn serve_script() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        FACETED_LISTING_JS,
    )
}
