use std::sync::Arc;

use http::{header::ACCEPT, StatusCode};

use crate::{
    accept,
    config::CachingConfig,
    error::CacheError,
    fingerprint::RequestFingerprint,
    key::{CacheKey, KeyBuilder},
    state::RequestCacheState,
    store::{CacheReadStream, CacheStore, ResponseHead},
};

//
// RequestOutcome
//

/// Result of [`CachingPolicy::on_request`].
pub enum RequestOutcome {
    /// The request hit the cache. The caller should install a
    /// [`ReplayService`](crate::replay::ReplayService) built from `cached`
    /// in place of the real upstream connector and resume the chain
    /// without touching the request.
    Hit {
        /// The key the hit was found under (suffixed or not).
        key: CacheKey,
        /// The stored entry.
        cached: CacheReadStream,
        /// The per-request state for this hit, with `cached_response`
        /// populated from the stored head so it can be made visible to
        /// whatever resumes the chain.
        state: RequestCacheState,
    },

    /// The request missed (or caching is disabled for it). The chain
    /// continues to the real upstream with the given state carried into
    /// the response phase.
    Continue(RequestCacheState),
}

//
// ResponseDecision
//

/// Result of [`CachingPolicy::on_response`].
#[derive(Debug, PartialEq, Eq)]
pub enum ResponseDecision {
    /// Do not cache this response; pass it through unchanged.
    PassThrough,

    /// Cache this response under `key` (already suffixed with the
    /// content type, if one was present).
    Cache {
        /// The key to store the entry under.
        key: CacheKey,
    },
}

//
// CachingPolicy
//

/// The two-phase caching state machine.
///
/// One instance is shared across all requests for a given policy binding;
/// all of its methods take the per-request
/// [`RequestFingerprint`]/[`RequestCacheState`] explicitly rather than
/// reading from any shared mutable state, so it is trivially `Clone` +
/// `Sync`.
#[derive(Clone)]
pub struct CachingPolicy {
    store: Option<Arc<dyn CacheStore>>,
    config: CachingConfig,
}

impl CachingPolicy {
    /// Construct a policy bound to an optional store and a configuration.
    ///
    /// A `None` store behaves exactly like `ttl == 0`: the policy degrades
    /// to skip-cache rather than failing (see [`CacheError::ComponentMissing`]).
    pub fn new(store: Option<Arc<dyn CacheStore>>, config: CachingConfig) -> Self {
        Self { store, config }
    }

    /// The store bound to this policy, if any.
    pub fn store(&self) -> Option<&Arc<dyn CacheStore>> {
        self.store.as_ref()
    }

    /// The configuration this policy was constructed with.
    pub fn config(&self) -> CachingConfig {
        self.config
    }

    /// The configured TTL, if caching is enabled.
    pub fn ttl(&self) -> std::time::Duration {
        self.config.ttl_duration().unwrap_or_default()
    }

    /// Request-phase entry point.
    ///
    /// Consults the store once or twice (content-type-suffixed key first,
    /// then the default key) and either resolves to a hit or leaves
    /// `should_cache = true` for the response phase to pick up.
    pub async fn on_request(
        &self,
        fingerprint: &RequestFingerprint,
    ) -> Result<RequestOutcome, CacheError> {
        if self.config.is_disabled() {
            tracing::debug!("skip (ttl=0)");
            return Ok(RequestOutcome::Continue(RequestCacheState::disabled()));
        }

        let Some(store) = &self.store else {
            tracing::debug!("skip (no cache store configured)");
            return Ok(RequestOutcome::Continue(RequestCacheState::disabled()));
        };

        let base_key = KeyBuilder::build_key(fingerprint, self.config.include_query_in_key);

        let accept_header = fingerprint.headers().get(ACCEPT).and_then(|value| value.to_str().ok());
        let highest = accept::highest(accept_header);

        if let Some(media_type) = &highest {
            let suffixed_key = base_key.with_content_type_suffix(&media_type.to_string());
            if let Some(cached) = store.get_binary(&suffixed_key).await? {
                tracing::debug!(key = %suffixed_key, "hit (suffixed)");
                let state = RequestCacheState::hit(suffixed_key.clone(), cached.head().clone());
                return Ok(RequestOutcome::Hit { key: suffixed_key, cached, state });
            }
        }

        if let Some(cached) = store.get_binary(&base_key).await? {
            tracing::debug!(key = %base_key, "hit (default)");
            let state = RequestCacheState::hit(base_key.clone(), cached.head().clone());
            return Ok(RequestOutcome::Hit { key: base_key, cached, state });
        }

        tracing::debug!(key = %base_key, "miss");
        Ok(RequestOutcome::Continue(RequestCacheState::miss(base_key)))
    }

    /// Response-phase entry point.
    ///
    /// Purely a decision function: it does not touch the store. The caller
    /// is responsible for acting on [`ResponseDecision::Cache`] by calling
    /// [`CacheStore::put_binary`] and installing the write-through tee.
    pub fn on_response(&self, state: &RequestCacheState, head: &ResponseHead) -> ResponseDecision {
        if !state.should_cache {
            return ResponseDecision::PassThrough;
        }

        if head.status != StatusCode::OK {
            tracing::debug!(status = %head.status, "skip (non-200)");
            return ResponseDecision::PassThrough;
        }

        let Some(cache_id) = &state.cache_id else {
            // Defensive: response phase reached with no working key.
            tracing::debug!("skip (no cache-id in context)");
            return ResponseDecision::PassThrough;
        };

        let key = match head.content_type() {
            Some(content_type) if !content_type.is_empty() => {
                cache_id.with_content_type_suffix(content_type)
            }
            _ => cache_id.clone(),
        };

        ResponseDecision::Cache { key }
    }
}
