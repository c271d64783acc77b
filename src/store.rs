use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use http::{header::CONTENT_TYPE, HeaderMap, StatusCode};
use tokio_stream::Stream;

use crate::{error::CacheError, key::CacheKey};

//
// ResponseHead
//

/// The metadata half of a cached entry: status and headers, without a body.
///
/// Mirrors `http::response::Parts` but intentionally drops the `extensions`
/// bag, since nothing in this crate's data model needs type-erased request
/// extensions to survive a round trip through the store.
#[derive(Clone, Debug)]
pub struct ResponseHead {
    /// Response status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// Construct from a status and header map.
    pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
        Self { status, headers }
    }

    /// The `Content-Type` header value, if present and valid UTF-8.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
    }
}

//
// CacheReadStream
//

/// A lazy, finite, single-shot read of a stored entry.
///
/// The head is available synchronously (it was read from the store
/// together with the stream handle); the body is produced as zero or more
/// chunks, polled like any other [`Stream`].
pub struct CacheReadStream {
    head: ResponseHead,
    body: Pin<Box<dyn Stream<Item = Result<Bytes, CacheError>> + Send>>,
}

impl CacheReadStream {
    /// Construct from a head and a body chunk stream.
    pub fn new(
        head: ResponseHead,
        body: impl Stream<Item = Result<Bytes, CacheError>> + Send + 'static,
    ) -> Self {
        Self { head, body: Box::pin(body) }
    }

    /// The stored response's head.
    pub fn head(&self) -> &ResponseHead {
        &self.head
    }
}

impl Stream for CacheReadStream {
    type Item = Result<Bytes, CacheError>;

    fn poll_next(mut self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.body.as_mut().poll_next(context)
    }
}

//
// CacheWriteHandle
//

/// A handle for streaming a response body into the cache.
///
/// Obtained synchronously from [`CacheStore::put_binary`]. Chunks are
/// pushed as they arrive from upstream; [`end`](Self::end) commits the
/// entry. Dropping the handle without calling `end` must be treated by the
/// implementation as an abort — no partial entry may become visible to a
/// later `get_binary`.
#[async_trait]
pub trait CacheWriteHandle: Send {
    /// Append one chunk to the entry being written.
    async fn write(&mut self, chunk: Bytes) -> Result<(), CacheError>;

    /// Commit the entry. Consumes the handle so it cannot be written to
    /// again.
    async fn end(self: Box<Self>) -> Result<(), CacheError>;
}

//
// CacheStore
//

/// The async binary key/value store backing the caching policy.
///
/// The policy depends on this trait only; [`crate::implementation::moka`]
/// supplies a process-local reference implementation so the crate is
/// runnable standalone.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Look up an entry. `Ok(None)` is a miss; an `Err` is a store failure
    /// and, during the request phase, is fatal to the request.
    async fn get_binary(&self, key: &CacheKey) -> Result<Option<CacheReadStream>, CacheError>;

    /// Acquire a write handle for a new entry. Synchronous: the caller
    /// gets a handle back immediately and streams chunks into it over
    /// time.
    fn put_binary(
        &self,
        key: CacheKey,
        head: ResponseHead,
        ttl: Duration,
    ) -> Box<dyn CacheWriteHandle>;

    /// Remove a single entry, if present.
    async fn invalidate(&self, key: &CacheKey);

    /// Remove every entry. Intended for operator-triggered resets, not for
    /// anything driven by the request path (cache invalidation on writes
    /// is explicitly out of scope).
    async fn invalidate_all(&self);
}
