use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    task::{Context, Poll},
    time::Duration,
};

use bytes::Bytes;
use http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use tower::{Layer, Service, ServiceExt};

use crate::{
    fingerprint::Identity, implementation::moka::MokaCacheStore, layer::CachingLayer,
    store::CacheStore,
};

// Records every call it receives and answers from a pre-seeded queue, so a
// test can assert "the upstream was (not) called" just by checking
// `call_count`.
#[derive(Clone)]
struct RecordingUpstream {
    responses: Arc<Mutex<VecDeque<Response<Full<Bytes>>>>>,
    call_count: Arc<AtomicUsize>,
}

impl RecordingUpstream {
    fn new(responses: Vec<Response<Full<Bytes>>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().collect())),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Service<Request<Full<Bytes>>> for RecordingUpstream {
    type Response = Response<Full<Bytes>>;
    type Error = std::convert::Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _context: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _request: Request<Full<Bytes>>) -> Self::Future {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.responses.lock().unwrap();
        let response = queue.pop_front().unwrap_or_else(|| response(StatusCode::OK, &[], b"default"));
        Box::pin(async move { Ok(response) })
    }
}

fn response(status: StatusCode, headers: &[(&str, &str)], body: &'static [u8]) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    builder.body(Full::new(Bytes::from_static(body))).unwrap()
}

fn request(path_and_query: &str, accept: Option<&str>) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method("GET").uri(format!("http://example.test{path_and_query}"));
    if let Some(accept) = accept {
        builder = builder.header(http::header::ACCEPT, accept);
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

async fn body_bytes(response: Response<BoxBody<Bytes, crate::error::CacheError>>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn layer_with_store(ttl: Duration, include_query_in_key: bool, store: Arc<dyn CacheStore>) -> CachingLayer<Full<Bytes>> {
    CachingLayer::new(|_request: &Request<Full<Bytes>>| Identity::ApiKey("k".into()))
        .cache(store)
        .ttl(ttl)
        .include_query_in_key(include_query_in_key)
}

#[tokio::test]
async fn s1_basic_hit_miss_then_expire() {
    let store: Arc<dyn CacheStore> = Arc::new(MokaCacheStore::new(100));
    let upstream = RecordingUpstream::new(vec![response(StatusCode::OK, &[("content-type", "text/plain")], b"fresh")]);
    let layer = layer_with_store(Duration::from_millis(200), false, store);
    let mut service = layer.layer(upstream.clone());

    let first = service.ready().await.unwrap().call(request("/some/cached-resource", None)).await.unwrap();
    assert_eq!(body_bytes(first).await, Bytes::from_static(b"fresh"));
    assert_eq!(upstream.call_count(), 1);

    let second = service.ready().await.unwrap().call(request("/some/cached-resource", None)).await.unwrap();
    assert_eq!(body_bytes(second).await, Bytes::from_static(b"fresh"));
    assert_eq!(upstream.call_count(), 1, "second request should be served from cache");

    tokio::time::sleep(Duration::from_millis(400)).await;

    let third = service.ready().await.unwrap().call(request("/some/cached-resource", None)).await.unwrap();
    let _ = body_bytes(third).await;
    assert_eq!(upstream.call_count(), 2, "expired entry must trigger a fresh upstream call");
}

#[tokio::test]
async fn s2_query_string_in_key() {
    let store: Arc<dyn CacheStore> = Arc::new(MokaCacheStore::new(100));
    let upstream = RecordingUpstream::new(vec![
        response(StatusCode::OK, &[], b"a"),
        response(StatusCode::OK, &[], b"b"),
    ]);
    let layer = layer_with_store(Duration::from_secs(60), true, store);
    let mut service = layer.layer(upstream.clone());

    let a = service.ready().await.unwrap().call(request("/r?x=1", None)).await.unwrap();
    assert_eq!(body_bytes(a).await, Bytes::from_static(b"a"));

    let b = service.ready().await.unwrap().call(request("/r?x=2", None)).await.unwrap();
    assert_eq!(body_bytes(b).await, Bytes::from_static(b"b"));
    assert_eq!(upstream.call_count(), 2, "different query strings must not share an entry");

    let a_again = service.ready().await.unwrap().call(request("/r?x=1", None)).await.unwrap();
    assert_eq!(body_bytes(a_again).await, Bytes::from_static(b"a"));
    assert_eq!(upstream.call_count(), 2, "repeating a query string must hit");
}

#[tokio::test]
async fn s3_content_type_disambiguation() {
    let store: Arc<dyn CacheStore> = Arc::new(MokaCacheStore::new(100));
    let upstream = RecordingUpstream::new(vec![
        response(StatusCode::OK, &[("content-type", "application/json")], b"{}"),
        response(StatusCode::OK, &[("content-type", "application/xml")], b"<a/>"),
    ]);
    let layer = layer_with_store(Duration::from_secs(60), false, store);
    let mut service = layer.layer(upstream.clone());

    let json = service
        .ready().await.unwrap()
        .call(request("/r", Some("application/json")))
        .await
        .unwrap();
    assert_eq!(body_bytes(json).await, Bytes::from_static(b"{}"));
    assert_eq!(upstream.call_count(), 1);

    let xml = service
        .ready().await.unwrap()
        .call(request("/r", Some("application/xml")))
        .await
        .unwrap();
    assert_eq!(body_bytes(xml).await, Bytes::from_static(b"<a/>"));
    assert_eq!(upstream.call_count(), 2, "a different Accept must miss and hit upstream fresh");

    let json_again = service
        .ready().await.unwrap()
        .call(request("/r", Some("application/json")))
        .await
        .unwrap();
    assert_eq!(body_bytes(json_again).await, Bytes::from_static(b"{}"));
    assert_eq!(upstream.call_count(), 2, "the original entry must still be hit");
}

#[tokio::test]
async fn s4_non_200_is_not_cached() {
    let store: Arc<dyn CacheStore> = Arc::new(MokaCacheStore::new(100));
    let upstream = RecordingUpstream::new(vec![
        response(StatusCode::INTERNAL_SERVER_ERROR, &[], b"oops"),
        response(StatusCode::INTERNAL_SERVER_ERROR, &[], b"oops again"),
    ]);
    let layer = layer_with_store(Duration::from_secs(60), false, store);
    let mut service = layer.layer(upstream.clone());

    let first = service.ready().await.unwrap().call(request("/r", None)).await.unwrap();
    assert_eq!(first.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let second = service.ready().await.unwrap().call(request("/r", None)).await.unwrap();
    assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(upstream.call_count(), 2, "a 500 must never be served from cache");
}

#[tokio::test]
async fn s5_replay_preserves_head_and_body() {
    let store: Arc<dyn CacheStore> = Arc::new(MokaCacheStore::new(100));
    let upstream = RecordingUpstream::new(vec![response(
        StatusCode::OK,
        &[("content-type", "application/json"), ("x-foo", "1")],
        b"payload",
    )]);
    let layer = layer_with_store(Duration::from_secs(60), false, store);
    let mut service = layer.layer(upstream.clone());

    let _ = service.ready().await.unwrap().call(request("/r", None)).await.unwrap();

    let replayed = service.ready().await.unwrap().call(request("/r", None)).await.unwrap();
    assert_eq!(replayed.status(), StatusCode::OK);
    assert_eq!(replayed.headers().get("content-type").unwrap(), "application/json");
    assert_eq!(replayed.headers().get("x-foo").unwrap(), "1");
    assert_eq!(body_bytes(replayed).await, Bytes::from_static(b"payload"));
    assert_eq!(upstream.call_count(), 1, "a hit must not call upstream again");
}

#[tokio::test]
async fn s6_store_lookup_error_is_fatal_and_skips_upstream() {
    struct FailingStore;

    #[async_trait::async_trait]
    impl CacheStore for FailingStore {
        async fn get_binary(
            &self,
            key: &crate::key::CacheKey,
        ) -> Result<Option<crate::store::CacheReadStream>, crate::error::CacheError> {
            Err(crate::error::CacheError::lookup(key.as_str(), std::io::Error::other("store down")))
        }

        fn put_binary(
            &self,
            _key: crate::key::CacheKey,
            _head: crate::store::ResponseHead,
            _ttl: Duration,
        ) -> Box<dyn crate::store::CacheWriteHandle> {
            unreachable!("request phase must fail before a response is ever produced")
        }

        async fn invalidate(&self, _key: &crate::key::CacheKey) {}
        async fn invalidate_all(&self) {}
    }

    let store: Arc<dyn CacheStore> = Arc::new(FailingStore);
    let upstream = RecordingUpstream::new(vec![response(StatusCode::OK, &[], b"never seen")]);
    let layer = layer_with_store(Duration::from_secs(60), false, store);
    let mut service = layer.layer(upstream.clone());

    let outcome = service.ready().await.unwrap().call(request("/r", None)).await;
    assert!(outcome.is_err(), "a fatal lookup error must propagate rather than degrade to a miss");
    assert_eq!(upstream.call_count(), 0, "upstream must never be called once the lookup itself failed");
}
