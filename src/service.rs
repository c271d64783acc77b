use std::{
    fmt,
    future::Future,
    mem,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{combinators::BoxBody, BodyExt};
use tower::Service;

use crate::{
    error::CacheError,
    fingerprint::{Identity, RequestFingerprint},
    policy::{CachingPolicy, RequestOutcome, ResponseDecision},
    replay::ReplayService,
    state::RequestCacheState,
    store::ResponseHead,
    tee::TeeBody,
};

//
// CachingService
//

/// The response caching policy installed as a [`tower::Service`].
///
/// You will usually reach this through [`CachingLayer`](crate::layer::CachingLayer)
/// rather than constructing it directly.
pub struct CachingService<InnerServiceT, ReqBody> {
    inner_service: InnerServiceT,
    policy: CachingPolicy,
    resolve_identity: Arc<dyn Fn(&Request<ReqBody>) -> Identity + Send + Sync>,
}

impl<InnerServiceT, ReqBody> CachingService<InnerServiceT, ReqBody> {
    /// Constructor.
    pub fn new(
        inner_service: InnerServiceT,
        policy: CachingPolicy,
        resolve_identity: Arc<dyn Fn(&Request<ReqBody>) -> Identity + Send + Sync>,
    ) -> Self {
        Self { inner_service, policy, resolve_identity }
    }

    // Clone while keeping `inner_service`.
    //
    // See: https://docs.rs/tower/latest/tower/trait.Service.html#be-careful-when-cloning-inner-services
    fn clone_and_keep_inner_service(&mut self) -> Self
    where
        InnerServiceT: Clone,
    {
        let mut clone = self.clone();
        clone.inner_service = mem::replace(&mut self.inner_service, clone.inner_service);
        clone
    }

    async fn handle<ResponseBodyT>(
        mut self,
        request: Request<ReqBody>,
    ) -> Result<Response<BoxBody<Bytes, CacheError>>, CachingError<InnerServiceT::Error>>
    where
        InnerServiceT: Service<Request<ReqBody>, Response = Response<ResponseBodyT>>,
        ResponseBodyT: http_body::Body<Data = Bytes> + Send + 'static,
        ResponseBodyT::Error: std::error::Error + Send + Sync + 'static,
    {
        let identity = (self.resolve_identity)(&request);
        let fingerprint = RequestFingerprint::from_request(identity, &request);

        match self.policy.on_request(&fingerprint).await.map_err(CachingError::Cache)? {
            RequestOutcome::Hit { key, cached, state } => {
                tracing::debug!(key = %key, "serving replay");
                let mut replay = ReplayService::new(key, cached);
                let mut response = replay.call(request).await.map_err(CachingError::Cache)?;
                // Makes `state.cached_response` (the stored head) visible to
                // anything further down the chain that inspects the response.
                response.extensions_mut().insert(state);
                Ok(response.map(BodyExt::boxed))
            }

            RequestOutcome::Continue(state) => {
                let upstream_response =
                    self.inner_service.call(request).await.map_err(CachingError::Inner)?;
                Ok(self.install_tee(state, upstream_response))
            }
        }
    }

    fn install_tee<ResponseBodyT>(
        &self,
        state: RequestCacheState,
        upstream_response: Response<ResponseBodyT>,
    ) -> Response<BoxBody<Bytes, CacheError>>
    where
        ResponseBodyT: http_body::Body<Data = Bytes> + Send + 'static,
        ResponseBodyT::Error: std::error::Error + Send + Sync + 'static,
    {
        let (parts, body) = upstream_response.into_parts();
        let head = ResponseHead::new(parts.status, parts.headers.clone());

        let decision = self.policy.on_response(&state, &head);
        match (decision, self.policy.store()) {
            (ResponseDecision::Cache { key }, Some(store)) => {
                tracing::debug!(key = %key, "storing");
                let tee = TeeBody::new(store.clone(), key, head, self.policy.ttl(), body);
                Response::from_parts(parts, tee.map_err(CacheError::upstream).boxed())
            }
            _ => Response::from_parts(parts, body.map_err(CacheError::upstream).boxed()),
        }
    }
}

impl<InnerServiceT: Clone, ReqBody> Clone for CachingService<InnerServiceT, ReqBody> {
    fn clone(&self) -> Self {
        Self {
            inner_service: self.inner_service.clone(),
            policy: self.policy.clone(),
            resolve_identity: self.resolve_identity.clone(),
        }
    }
}

impl<InnerServiceT, ReqBody, ResponseBodyT> Service<Request<ReqBody>>
    for CachingService<InnerServiceT, ReqBody>
where
    InnerServiceT:
        Service<Request<ReqBody>, Response = Response<ResponseBodyT>> + Clone + Send + 'static,
    InnerServiceT::Future: Send,
    ReqBody: Send + 'static,
    ResponseBodyT: http_body::Body<Data = Bytes> + Send + 'static,
    ResponseBodyT::Error: std::error::Error + Send + Sync + 'static,
{
    type Response = Response<BoxBody<Bytes, CacheError>>;
    type Error = CachingError<InnerServiceT::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, context: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // A replay never calls the inner service, but we have no way to
        // know the outcome before `call`, so readiness is always deferred
        // to the inner service, same as Tower's usual layering advice.
        self.inner_service.poll_ready(context).map_err(CachingError::Inner)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let cloned_self = self.clone_and_keep_inner_service();
        Box::pin(cloned_self.handle(request))
    }
}

//
// CachingError
//

/// Error surfaced by [`CachingService`]: either the policy itself failed
/// (a fatal request-phase store lookup) or the inner connector did.
#[derive(Debug)]
pub enum CachingError<E> {
    /// A request-phase cache lookup failed. Fatal: the caller should treat
    /// this the same as any other connector failure rather than silently
    /// falling back to a miss.
    Cache(CacheError),
    /// The inner connector service failed.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for CachingError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache(error) => write!(f, "{error}"),
            Self::Inner(error) => write!(f, "{error}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for CachingError<E> {}
