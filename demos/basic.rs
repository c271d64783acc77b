use std::{sync::Arc, time::Duration};

use axum::{error_handling::HandleErrorLayer, extract::Request, response::Response, routing::get, Router};
use gateway_response_cache::{
    fingerprint::Identity, implementation::moka::MokaCacheStore, layer::CachingLayer, service::CachingError,
    store::CacheStore,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

// Axum server fronted by the response caching layer.
//
// Pay attention to the tracing log to see what the policy and the cache are
// doing! Entries expire after 10 seconds.
//
// You can send requests from a web browser or via CLI. Some fun examples:
//
//   curl http://localhost:8080
//   curl http://localhost:8080?x=1&y=2
//   curl http://localhost:8080?y=2&x=1

const CACHE_CAPACITY: u64 = 10_000;
const CACHE_DURATION: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let store: Arc<dyn CacheStore> = Arc::new(MokaCacheStore::new(CACHE_CAPACITY));

    // Every request is attributed to the same API key here; a real gateway
    // would resolve this from its own client/API registry before the
    // request ever reaches this layer.
    let caching =
        CachingLayer::new(|_request: &Request| Identity::ApiKey("demo".into())).cache(store).ttl(CACHE_DURATION);

    let router = Router::new().route("/", get(|| async { "Hello, world!\n" })).layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_caching_error))
            .layer(caching),
    ).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind("[::]:8080").await.expect("TcpListener::bind");
    tracing::info!("bound to: {:?}", listener.local_addr());
    axum::serve(listener, router).await.expect("axum::serve");
}

async fn handle_caching_error(error: CachingError<std::convert::Infallible>) -> Response {
    tracing::error!(%error, "caching policy failed");
    Response::builder()
        .status(http::StatusCode::INTERNAL_SERVER_ERROR)
        .body(axum::body::Body::from("cache lookup failed\n"))
        .expect("valid response")
}
