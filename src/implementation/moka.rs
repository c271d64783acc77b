use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use moka::{future::Cache as MokaFutureCache, Expiry};
use tokio_stream::once;

use crate::{
    error::CacheError,
    key::CacheKey,
    store::{CacheReadStream, CacheStore, CacheWriteHandle, ResponseHead},
};

#[derive(Clone)]
struct StoredEntry {
    head: ResponseHead,
    body: Bytes,
    ttl: Duration,
}

struct EntryExpiry;

impl Expiry<CacheKey, StoredEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &StoredEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

//
// MokaCacheStore
//

/// A process-local [`CacheStore`] backed by [`moka::future::Cache`].
///
/// Each entry's time-to-live is its own, captured at write time and read
/// back out by a per-entry [`Expiry`], rather than a single cache-wide TTL —
/// this lets one store back multiple [`CachingLayer`](crate::layer::CachingLayer)s
/// configured with different durations.
///
/// Entries are buffered fully in memory before being committed: streaming
/// happens at the write-tee boundary (chunks arrive incrementally from
/// upstream as the response streams), not inside the store itself, since a
/// Moka value must be a single owned, `Clone` object.
pub struct MokaCacheStore {
    cache: MokaFutureCache<CacheKey, StoredEntry>,
}

impl MokaCacheStore {
    /// A store capped at `max_capacity` entries (by count, not byte size).
    pub fn new(max_capacity: u64) -> Self {
        let cache = MokaFutureCache::builder().max_capacity(max_capacity).expire_after(EntryExpiry).build();
        Self { cache }
    }
}

#[async_trait]
impl CacheStore for MokaCacheStore {
    async fn get_binary(&self, key: &CacheKey) -> Result<Option<CacheReadStream>, CacheError> {
        Ok(self
            .cache
            .get(key)
            .await
            .map(|entry| CacheReadStream::new(entry.head, once(Ok(entry.body)))))
    }

    fn put_binary(&self, key: CacheKey, head: ResponseHead, ttl: Duration) -> Box<dyn CacheWriteHandle> {
        Box::new(MokaWriteHandle { cache: self.cache.clone(), key, head, ttl, buffer: BytesMut::new() })
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key).await;
    }

    async fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

struct MokaWriteHandle {
    cache: MokaFutureCache<CacheKey, StoredEntry>,
    key: CacheKey,
    head: ResponseHead,
    ttl: Duration,
    buffer: BytesMut,
}

#[async_trait]
impl CacheWriteHandle for MokaWriteHandle {
    async fn write(&mut self, chunk: Bytes) -> Result<(), CacheError> {
        self.buffer.extend_from_slice(&chunk);
        Ok(())
    }

    async fn end(self: Box<Self>) -> Result<(), CacheError> {
        let entry = StoredEntry { head: self.head, body: self.buffer.freeze(), ttl: self.ttl };
        self.cache.insert(self.key, entry).await;
        Ok(())
    }
}
