use std::{
    fmt, future::Ready, pin::Pin, task::{Context, Poll},
};

use bytes::Bytes;
use http::{Request, Response};
use http_body::{Body, Frame, SizeHint};
use tower::Service;

use crate::{error::CacheError, key::CacheKey, store::CacheReadStream};

//
// ReplayBody
//

/// The body of a replayed response: pumps chunks out of a
/// [`CacheReadStream`] in arrival order, surfacing any stream error as a
/// [`CacheError::Replay`].
///
/// `CacheReadStream` stores its chunk stream as a pinned boxed trait
/// object, which makes it (and therefore `ReplayBody`) unconditionally
/// [`Unpin`] — no `pin_project` needed here.
pub struct ReplayBody {
    key: CacheKey,
    stream: CacheReadStream,
    done: bool,
}

impl ReplayBody {
    fn new(key: CacheKey, stream: CacheReadStream) -> Self {
        Self { key, stream, done: false }
    }
}

impl Body for ReplayBody {
    type Data = Bytes;
    type Error = CacheError;

    fn poll_frame(
        self: Pin<&mut Self>,
        context: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.stream).poll_next(context) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
            Poll::Ready(Some(Err(error))) => {
                this.done = true;
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.done
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::default()
    }
}

//
// ReplayService
//

/// A synthetic upstream connector that replays one cached entry instead of
/// opening a network connection.
///
/// Constructed from a single [`CacheReadStream`]; produces exactly one
/// response. A second `call` — which should never happen given how
/// [`CachingService`](crate::service::CachingService) drives it — returns
/// [`CacheError::Replay`] rather than panicking.
pub struct ReplayService {
    key: CacheKey,
    entry: Option<CacheReadStream>,
}

impl ReplayService {
    /// Construct a replay connector for the given cached entry.
    pub fn new(key: CacheKey, entry: CacheReadStream) -> Self {
        Self { key, entry: Some(entry) }
    }
}

impl<ReqBody> Service<Request<ReqBody>> for ReplayService {
    type Response = Response<ReplayBody>;
    type Error = CacheError;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _context: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _request: Request<ReqBody>) -> Self::Future {
        let result = match self.entry.take() {
            Some(entry) => {
                let head = entry.head().clone();
                let mut builder = Response::builder().status(head.status);
                if let Some(headers) = builder.headers_mut() {
                    *headers = head.headers;
                }
                Ok(builder
                    .body(ReplayBody::new(self.key.clone(), entry))
                    .expect("status and headers copied from a valid cached response"))
            }
            None => Err(CacheError::replay(self.key.to_string(), AlreadyReplayed)),
        };
        std::future::ready(result)
    }
}

#[derive(Debug)]
struct AlreadyReplayed;

impl fmt::Display for AlreadyReplayed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("replay connector already produced its one response")
    }
}

impl std::error::Error for AlreadyReplayed {}
