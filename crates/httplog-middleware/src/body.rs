//! Request body instrumentation.

use bytes::Buf;
use hyper::body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// Shared count of body bytes handed to the reader.
///
/// Clones observe the same counter. The value stays valid after the body
/// is dropped.
#[derive(Debug, Clone, Default)]
pub struct ByteCounter(Arc<AtomicU64>);

impl ByteCounter {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::AcqRel);
    }
}

/// A body that counts the data bytes its reader receives.
///
/// Frames, trailers, errors and end-of-stream pass through unchanged. Only
/// data frames actually returned to the reader are counted, so a handler
/// that stops reading early is measured exactly. Dropping the body drops
/// (and thereby closes) the wrapped stream.
#[derive(Debug)]
pub struct RecordingBody<B> {
    inner: B,
    counter: ByteCounter,
}

impl<B> RecordingBody<B> {
    /// Wraps `inner`.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            counter: ByteCounter::new(),
        }
    }

    /// Bytes read so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.counter.get()
    }

    /// A handle to the byte counter.
    #[must_use]
    pub fn counter(&self) -> ByteCounter {
        self.counter.clone()
    }
}

impl<B> Body for RecordingBody<B>
where
    B: Body + Unpin,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if let Poll::Ready(Some(Ok(frame))) = &polled {
            if let Some(data) = frame.data_ref() {
                this.counter.add(data.remaining() as u64);
            }
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
