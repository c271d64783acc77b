use std::sync::Arc;

/// A boxed, cloneable, type-erased error.
///
/// Cache store implementations return arbitrary error types; we capture them
/// behind this alias so [`CacheError`] stays a plain enum instead of growing a
/// generic parameter that would have to be threaded through the whole crate.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

fn box_error<E>(error: E) -> BoxError
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(error)
}

/// Errors raised by the caching policy.
///
/// Request-phase lookup errors are fatal to the request, response-phase
/// write errors are swallowed so that client delivery is never affected,
/// and configuration errors always degrade rather than propagate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The store failed to answer `getBinary` during the request phase.
    ///
    /// This is the one variant the policy surfaces as a hard failure: the
    /// chain must abort rather than silently treat it as a cache miss.
    #[error("cache lookup failed for key {key}: {source}")]
    Lookup {
        /// The key that was being looked up.
        key: String,
        /// Underlying store error.
        source: BoxError,
    },

    /// The cache-side write failed once bytes had already started flowing
    /// downstream.
    ///
    /// Never returned to a caller driving a response to completion — the
    /// tee only logs it (see [`crate::tee`]) — but it is a real variant so
    /// that store implementations and tests can name the failure.
    #[error("cache write failed for key {key}: {source}")]
    StoreWrite {
        /// The key that was being written.
        key: String,
        /// Underlying store error.
        source: BoxError,
    },

    /// A cached body stream errored mid-playback during replay.
    #[error("replay of cached entry {key} failed: {source}")]
    Replay {
        /// The key being replayed.
        key: String,
        /// Underlying store error.
        source: BoxError,
    },

    /// No [`CacheStore`](crate::store::CacheStore) was configured on the
    /// layer.
    ///
    /// In the response phase this degrades to skip-cache; it must never
    /// break the response itself.
    #[error("no cache store configured")]
    ComponentMissing,

    /// The inner connector's response body failed while streaming, outside
    /// of anything the caching policy itself did.
    ///
    /// Exists so [`crate::service::CachingService`] can unify the inner
    /// service's body error type with [`CacheError`] when boxing its
    /// response body.
    #[error("upstream response body error: {0}")]
    Upstream(BoxError),
}

impl CacheError {
    /// Build a [`CacheError::Lookup`] from any store error.
    pub fn lookup<E>(key: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Lookup { key: key.into(), source: box_error(source) }
    }

    /// Build a [`CacheError::StoreWrite`] from any store error.
    pub fn store_write<E>(key: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StoreWrite { key: key.into(), source: box_error(source) }
    }

    /// Build a [`CacheError::Replay`] from any store error.
    pub fn replay<E>(key: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Replay { key: key.into(), source: box_error(source) }
    }

    /// Build a [`CacheError::Upstream`] from any response body error.
    pub fn upstream<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Upstream(box_error(source))
    }
}
