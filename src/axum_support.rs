//! Axum integration: a request handler for operator-triggered cache resets.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Response};

use crate::store::CacheStore;

/// An Axum handler that invalidates every entry in the given store and
/// answers `204 No Content`.
///
/// Mount it behind whatever operator-only route and auth the rest of the
/// gateway uses; this crate has no opinion on either.
///
/// ```ignore
/// let router = Router::new()
///     .route("/cache/reset", axum::routing::post(reset_cache_handler))
///     .with_state(store);
/// ```
pub async fn reset_cache_handler(State(store): State<Arc<dyn CacheStore>>) -> Response {
    tracing::info!("resetting cache");
    store.invalidate_all().await;
    Response::builder().status(StatusCode::NO_CONTENT).body(axum::body::Body::empty()).expect("valid response")
}
