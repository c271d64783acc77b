use std::{sync::Arc, time::Duration};

use http::Request;
use tower::Layer;

use crate::{
    config::CachingConfig, fingerprint::Identity, policy::CachingPolicy, service::CachingService,
    store::CacheStore,
};

//
// CachingLayer
//

/// A [`tower::Layer`] that installs the response caching policy in front of
/// an inner connector service.
///
/// Usage notes
/// ===========
///
/// 1. The identity that keys a request (an API key, or an org/api/version
///    contract triple) is resolved upstream of this layer — by the
///    gateway's API/client registry, which is out of scope here — and is
///    handed to this layer as a `resolve_identity` hook rather than read off
///    the request itself.
///
/// 2. With no [`cache`](Self::cache) configured, or a TTL of zero (the
///    default), the layer degrades to a transparent pass-through: the
///    request and response phases both run, but neither ever touches a
///    store.
///
/// 3. A cache hit does not call the inner service at all: the policy
///    chain is diverted to a synthetic replay connector that reproduces the
///    stored response byte for byte. A miss calls the inner service and, if
///    the response is a cacheable `200`, tees its body into the store while
///    streaming it downstream unchanged.
pub struct CachingLayer<ReqBody> {
    policy: CachingPolicy,
    resolve_identity: Arc<dyn Fn(&Request<ReqBody>) -> Identity + Send + Sync>,
}

impl<ReqBody> CachingLayer<ReqBody> {
    /// A layer with caching disabled (no store, TTL `0`) and the given
    /// identity-resolution hook.
    pub fn new(resolve_identity: impl Fn(&Request<ReqBody>) -> Identity + Send + Sync + 'static) -> Self {
        Self {
            policy: CachingPolicy::new(None, CachingConfig::default()),
            resolve_identity: Arc::new(resolve_identity),
        }
    }

    /// Bind a cache store. Not bound by default, in which case the layer is
    /// a pass-through regardless of the configured TTL.
    pub fn cache(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.policy = CachingPolicy::new(Some(store), self.policy.config());
        self
    }

    /// Set the full caching configuration (TTL and query-string inclusion)
    /// in one call.
    pub fn configure(mut self, config: CachingConfig) -> Self {
        self.policy = CachingPolicy::new(self.policy.store().cloned(), config);
        self
    }

    /// Entry time-to-live. `Duration::ZERO` (the default) disables caching
    /// entirely, independent of whether a store is bound.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        let mut config = self.policy.config();
        config.ttl = ttl.as_secs();
        self.policy = CachingPolicy::new(self.policy.store().cloned(), config);
        self
    }

    /// Whether the query string participates in cache-key derivation.
    ///
    /// `false` by default: two requests that differ only in query string
    /// share an entry.
    pub fn include_query_in_key(mut self, include_query_in_key: bool) -> Self {
        let mut config = self.policy.config();
        config.include_query_in_key = include_query_in_key;
        self.policy = CachingPolicy::new(self.policy.store().cloned(), config);
        self
    }
}

impl<InnerServiceT, ReqBody> Layer<InnerServiceT> for CachingLayer<ReqBody> {
    type Service = CachingService<InnerServiceT, ReqBody>;

    fn layer(&self, inner_service: InnerServiceT) -> Self::Service {
        CachingService::new(inner_service, self.policy.clone(), self.resolve_identity.clone())
    }
}
