//! A [`ResponseWriter`] that streams to a hyper connection.
//!
//! The head (status and headers) is handed to hyper through a oneshot once
//! it is committed. Body bytes follow over a bounded channel read by
//! [`ChannelBody`]. Writes are buffered and sent as one frame when the
//! buffer fills, on [`Flush`], or when the writer finishes.
//!
//! At most [`CHANNEL_CAPACITY`] frames wait for the client. While the channel
//! is full, writes keep buffering up to [`MAX_BUFFERED`] bytes; past that,
//! `write` and `flush` fail with [`io::ErrorKind::WouldBlock`] without
//! accepting anything, until the client reads.
//!
//! The head is committed by the first write or flush, or by [`finish`] for a
//! handler that writes nothing. Header changes after that are not sent.
//!
//! [`finish`]: StreamingWriter::finish

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Response, StatusCode};
use hyper::body::{Body, Frame, SizeHint};
use httplog_middleware::{
    BoxError, BoxFuture, Capabilities, CloseNotify, Flush, ResponseWriter, Upgrade,
};
use hyper::upgrade::OnUpgrade;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// Buffered bytes that trigger an automatic send.
pub const FLUSH_THRESHOLD: usize = 8 * 1024;

/// Frames queued for the client before writes stop being sent.
pub const CHANNEL_CAPACITY: usize = 16;

/// Bytes a writer holds locally while the channel is full.
pub const MAX_BUFFERED: usize = 256 * 1024;

enum Chunk {
    Data(Bytes),
    End,
}

/// The body of a streamed response.
///
/// Ends normally once the writer finishes. If the writer is dropped first
/// (for example because the handler panicked) the body yields an error, so
/// the client sees an aborted response instead of a truncated one.
#[derive(Debug)]
pub struct ChannelBody {
    rx: Option<mpsc::Receiver<Chunk>>,
}

impl ChannelBody {
    /// A body with no content.
    #[must_use]
    pub const fn empty() -> Self {
        Self { rx: None }
    }
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Ready(None);
        };
        match ready!(rx.poll_recv(cx)) {
            Some(Chunk::Data(bytes)) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
            Some(Chunk::End) => {
                self.rx = None;
                Poll::Ready(None)
            }
            None => {
                self.rx = None;
                Poll::Ready(Some(Err("response aborted before completion".into())))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.rx.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        if self.rx.is_none() {
            SizeHint::with_exact(0)
        } else {
            SizeHint::default()
        }
    }
}

/// Streams a response to hyper.
///
/// Supports [`Flush`], [`CloseNotify`] and, for requests asking for a
/// protocol upgrade, [`Upgrade`].
pub struct StreamingWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    head: Option<oneshot::Sender<Response<ChannelBody>>>,
    body: Option<ChannelBody>,
    tx: mpsc::Sender<Chunk>,
    buffer: BytesMut,
    upgrade: Option<OnUpgrade>,
}

impl StreamingWriter {
    /// Creates a writer and the receiver its response head is delivered to.
    ///
    /// The receiver errors if the writer is dropped before committing.
    #[must_use]
    pub fn new(upgrade: Option<OnUpgrade>) -> (Self, oneshot::Receiver<Response<ChannelBody>>) {
        let (head_tx, head_rx) = oneshot::channel();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let writer = Self {
            status: None,
            headers: HeaderMap::new(),
            head: Some(head_tx),
            body: Some(ChannelBody { rx: Some(rx) }),
            tx,
            buffer: BytesMut::new(),
            upgrade,
        };
        (writer, head_rx)
    }

    /// Whether the head has been committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.head.is_none()
    }

    /// Commits the head if needed, sends buffered bytes and ends the body.
    ///
    /// Waits for channel space, so it completes once the client has taken
    /// all but the last [`CHANNEL_CAPACITY`] frames or has gone away.
    pub async fn finish(mut self) {
        self.commit();
        if !self.buffer.is_empty() {
            let bytes = self.buffer.split().freeze();
            if self.tx.send(Chunk::Data(bytes)).await.is_err() {
                return;
            }
        }
        let _ = self.tx.send(Chunk::End).await;
    }

    fn commit(&mut self) {
        let Some(head) = self.head.take() else {
            return;
        };
        let status = *self.status.get_or_insert(StatusCode::OK);
        let body = self.body.take().unwrap_or_else(ChannelBody::empty);

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        if head.send(response).is_err() {
            tracing::debug!("connection dropped before the response head was sent");
        }
    }

    fn send_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        match self.tx.try_reserve() {
            Ok(permit) => {
                permit.send(Chunk::Data(self.buffer.split().freeze()));
                Ok(())
            }
            Err(TrySendError::Full(())) => Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "client is not keeping up with the response",
            )),
            Err(TrySendError::Closed(())) => Err(client_gone()),
        }
    }
}

fn client_gone() -> io::Error {
    io::Error::new(
        io::ErrorKind::BrokenPipe,
        "client is no longer receiving the response",
    )
}

impl ResponseWriter for StreamingWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.commit();
        if self.tx.is_closed() {
            return Err(client_gone());
        }
        if !self.buffer.is_empty() && self.buffer.len() + buf.len() > MAX_BUFFERED {
            self.send_buffer()?;
        }
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= FLUSH_THRESHOLD {
            // The bytes are accepted either way; a full channel is retried
            // by the next write or flush.
            let _ = self.send_buffer();
        }
        Ok(buf.len())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            flush: true,
            upgrade: self.upgrade.is_some(),
            close_notify: true,
        }
    }

    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        Some(self)
    }

    fn upgrader(&mut self) -> Option<&mut dyn Upgrade> {
        if self.upgrade.is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn close_notifier(&self) -> Option<&dyn CloseNotify> {
        Some(self)
    }
}

impl Flush for StreamingWriter {
    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        self.send_buffer()
    }
}

impl Upgrade for StreamingWriter {
    fn take_upgrade(&mut self) -> Option<OnUpgrade> {
        self.upgrade.take()
    }
}

impl CloseNotify for StreamingWriter {
    fn closed(&self) -> BoxFuture<'static, ()> {
        let tx = self.tx.clone();
        Box::pin(async move { tx.closed().await })
    }
}

impl std::fmt::Debug for StreamingWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingWriter")
            .field("status", &self.status)
            .field("committed", &self.is_committed())
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}
