use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use tokio::sync::mpsc;

use crate::{
    key::CacheKey,
    store::{CacheStore, ResponseHead},
};

enum TeeMessage {
    Chunk(Bytes),
    End,
}

pin_project! {
    /// A body wrapper that forwards every chunk both downstream and into the
    /// cache store, committing the entry when the upstream body ends.
    ///
    /// The cache side runs on its own spawned task, decoupled from
    /// `poll_frame` via an unbounded channel: a send into the channel is
    /// synchronous and happens before the chunk is handed downstream, which
    /// is enough to satisfy "the cache write has been initiated for a chunk
    /// before that chunk is delivered downstream" without blocking the
    /// downstream poll on an async store call.
    ///
    /// A downstream read failure drops the sender without an `End` message,
    /// which is the abandon signal the spawned task's loop treats as an
    /// abort (see [`CacheStore::put_binary`]'s contract). A cache-side write
    /// failure only logs; it can never turn into an `Err` returned from
    /// `poll_frame`.
    pub struct TeeBody<B> {
        #[pin]
        inner: B,
        sender: Option<mpsc::UnboundedSender<TeeMessage>>,
    }
}

impl<B> TeeBody<B>
where
    B: Body<Data = Bytes>,
{
    /// Wrap `inner`, streaming its chunks into a newly acquired write handle
    /// for `key` at the same time they are forwarded downstream.
    ///
    /// The head is captured once here and is the same object passed to the
    /// store as the entry's head.
    pub fn new(store: Arc<dyn CacheStore>, key: CacheKey, head: ResponseHead, ttl: Duration, inner: B) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<TeeMessage>();

        tokio::spawn(async move {
            let mut handle = store.put_binary(key.clone(), head, ttl);
            while let Some(message) = receiver.recv().await {
                match message {
                    TeeMessage::Chunk(chunk) => {
                        if let Err(error) = handle.write(chunk).await {
                            tracing::warn!(key = %key, %error, "cache write abandoned");
                            return;
                        }
                    }
                    TeeMessage::End => {
                        if let Err(error) = handle.end().await {
                            tracing::warn!(key = %key, %error, "cache entry not committed");
                        }
                        return;
                    }
                }
            }
            // The channel was dropped (the body itself was dropped, e.g. the
            // request was cancelled) before an `End` arrived: drop `handle`
            // without calling `end`, which the store must treat as an abort.
        });

        Self { inner, sender: Some(sender) }
    }
}

impl<B> Body for TeeBody<B>
where
    B: Body<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: std::pin::Pin<&mut Self>,
        context: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        use std::task::Poll;

        let mut this = self.project();
        match this.inner.as_mut().poll_frame(context) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    if let Some(sender) = this.sender.as_ref() {
                        // A full channel/closed receiver is not our problem to
                        // surface downstream; the spawned task already ended.
                        let _ = sender.send(TeeMessage::Chunk(data.clone()));
                    }
                }
                Poll::Ready(Some(Ok(frame)))
            }

            Poll::Ready(Some(Err(error))) => {
                // Downstream failed: abandon the cache side best-effort by
                // dropping the sender without ever sending `End`.
                *this.sender = None;
                Poll::Ready(Some(Err(error)))
            }

            Poll::Ready(None) => {
                if let Some(sender) = this.sender.take() {
                    let _ = sender.send(TeeMessage::End);
                }
                Poll::Ready(None)
            }

            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
