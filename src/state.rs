use crate::{key::CacheKey, store::ResponseHead};

/// Context attribute name for [`RequestCacheState::should_cache`].
///
/// Kept as a named constant for documentation fidelity with gateways that
/// expose an actual string-keyed attribute bag (and for use as a
/// `tracing` field name), even though this crate threads
/// [`RequestCacheState`] explicitly rather than through one.
pub const ATTR_SHOULD_CACHE: &str = "caching.should-cache";

/// Context attribute name for [`RequestCacheState::cache_id`].
pub const ATTR_CACHE_ID: &str = "caching.cache-id";

/// Context attribute name for [`RequestCacheState::cached_response`].
pub const ATTR_CACHED_RESPONSE: &str = "caching.cached-response";

//
// RequestCacheState
//

/// Per-request policy state, scoped to the lifetime of a single request.
///
/// Created when the policy is entered in the request phase, mutated only by
/// the policy on the task servicing that request, and dropped when the
/// response phase completes. Never shared across requests.
#[derive(Clone, Debug)]
pub struct RequestCacheState {
    /// Whether the response phase should cache the upstream response.
    ///
    /// `true` at response entry unless the request phase already disabled
    /// caching for this request (TTL `0`, or a hit that installed a
    /// replay).
    pub should_cache: bool,

    /// The working cache key.
    ///
    /// Before the response is seen this is the unsuffixed key; the
    /// response phase may append a content-type suffix before using it to
    /// store the entry.
    pub cache_id: Option<CacheKey>,

    /// The head of a cached response, populated on the hit path so
    /// downstream policies can inspect what is being replayed.
    pub cached_response: Option<ResponseHead>,
}

impl RequestCacheState {
    /// The state for a request that should not consult or populate the
    /// cache at all (TTL `0`, or no store configured).
    pub fn disabled() -> Self {
        Self { should_cache: false, cache_id: None, cached_response: None }
    }

    /// The state for a request that missed the cache and should be
    /// considered for storage once the response arrives.
    pub fn miss(cache_id: CacheKey) -> Self {
        Self { should_cache: true, cache_id: Some(cache_id), cached_response: None }
    }

    /// The state for a request that hit the cache: a replay was installed,
    /// so the response phase must not cache again.
    pub fn hit(cache_id: CacheKey, cached_response: ResponseHead) -> Self {
        Self { should_cache: false, cache_id: Some(cache_id), cached_response: Some(cached_response) }
    }
}
