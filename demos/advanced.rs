use std::{sync::Arc, time::Duration};

use axum::{
    error_handling::HandleErrorLayer,
    extract::Request,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use gateway_response_cache::{
    axum_support::reset_cache_handler,
    fingerprint::Identity,
    implementation::moka::MokaCacheStore,
    layer::CachingLayer,
    service::CachingError,
    store::CacheStore,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

// (See demos/basic.rs first.)
//
// This server demonstrates content negotiation and query-string handling:
//
//   curl --header 'Accept: application/json' http://localhost:8080/greeting
//   curl --header 'Accept: text/plain' http://localhost:8080/greeting
//
//   curl http://localhost:8080/search?q=rust
//   curl http://localhost:8080/search?q=tower
//
//   curl --request POST http://localhost:8080/reset

const CACHE_CAPACITY: u64 = 10_000;
const CACHE_DURATION: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let store: Arc<dyn CacheStore> = Arc::new(MokaCacheStore::new(CACHE_CAPACITY));

    let caching = CachingLayer::new(|_request: &Request| Identity::ApiKey("demo".into()))
        .cache(store.clone())
        .ttl(CACHE_DURATION)
        .include_query_in_key(true);

    let router = Router::new()
        .route(
            "/greeting",
            get(|headers: axum::http::HeaderMap| async move {
                match headers.get(axum::http::header::ACCEPT).and_then(|value| value.to_str().ok()) {
                    Some(accept) if accept.contains("application/json") => {
                        Json(serde_json::json!({ "greeting": "hello" })).into_response()
                    }
                    _ => "hello\n".into_response(),
                }
            }),
        )
        .route(
            "/search",
            get(|query: axum::extract::RawQuery| async move {
                format!("results for {:?}\n", query.0)
            }),
        )
        .route("/reset", post(reset_cache_handler))
        .with_state(store) // only the "/reset" route needs this
        .layer(ServiceBuilder::new().layer(HandleErrorLayer::new(handle_caching_error)).layer(caching))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind("[::]:8080").await.expect("TcpListener::bind");
    tracing::info!("bound to: {:?}", listener.local_addr());
    axum::serve(listener, router).await.expect("axum::serve");
}

async fn handle_caching_error(error: CachingError<std::convert::Infallible>) -> Response {
    tracing::error!(%error, "caching policy failed");
    (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "cache lookup failed\n").into_response()
}
