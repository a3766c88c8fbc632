#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Every [`TestApp`] drives the real router over an in-memory store seeded
//! with the shirt catalogue, so tests need no database and never share
//! state.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use faceted_listing::cache::FormCache;
use faceted_listing::listing::ListingDefinitions;
use faceted_listing::routes;
use faceted_listing::state::AppState;
use faceted_listing::store::MemoryStore;
use faceted_listing_test_utils::{CATALOGUE_DEFINITIONS, catalogue_seed};

/// Test application wrapping the real router.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// App over the shirt catalogue.
    pub fn new() -> Self {
        Self::with_seed(&catalogue_seed())
    }

    /// App over the catalogue definitions with a custom seed document.
    pub fn with_seed(seed: &str) -> Self {
        let store = MemoryStore::from_yaml_str(seed).expect("Invalid seed document");
        let definitions = ListingDefinitions::from_yaml_str(CATALOGUE_DEFINITIONS)
            .expect("Invalid catalogue definitions");
        let state = AppState::from_parts(Arc::new(store), &definitions, FormCache::default())
            .expect("Failed to build application state");

        Self {
            router: routes::router(state.clone()),
            state,
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// GET a URI and return status and body text.
    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        let response = self
            .request(Request::get(uri).body(Body::empty()).unwrap())
            .await;
        let status = response.status();
        (status, body_text(response).await)
    }

    /// GET a URI expected to answer 200 with JSON.
    pub async fn get_json(&self, uri: &str) -> Value {
        let (status, body) = self.get(uri).await;
        assert_eq!(status, StatusCode::OK, "GET {uri}: {body}");
        serde_json::from_str(&body).expect("Response is not JSON")
    }

    /// POST with an empty body and return the status.
    pub async fn post(&self, uri: &str) -> StatusCode {
        self.request(Request::post(uri).body(Body::empty()).unwrap())
            .await
            .status()
    }
}

/// Read a response body as text.
pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
}
