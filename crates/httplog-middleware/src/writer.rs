//! The outbound response channel.
//!
//! Handlers write their response through a [`ResponseWriter`]: headers are
//! mutable until the head is committed, the first status set sticks, and a
//! write without a prior status commits `200 OK`.
//!
//! Some transports offer more than plain writes. Those optional capabilities
//! are discovered through explicit queries rather than downcasting:
//!
//! | Capability      | Query                               | Used for                          |
//! |-----------------|-------------------------------------|-----------------------------------|
//! | [`Flush`]       | [`ResponseWriter::flusher`]         | pushing buffered bytes to client  |
//! | [`Upgrade`]     | [`ResponseWriter::upgrader`]        | connection takeover (WebSocket)   |
//! | [`CloseNotify`] | [`ResponseWriter::close_notifier`]  | noticing a client disconnect      |
//!
//! Wrappers must answer these queries exactly like the writer they wrap,
//! otherwise a handler relying on a capability silently loses it.

use crate::handler::BoxFuture;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use std::io;

/// Optional capabilities a writer supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Buffered bytes can be flushed to the client.
    pub flush: bool,
    /// The connection can be taken over after the response head.
    pub upgrade: bool,
    /// The writer can report that the client went away.
    pub close_notify: bool,
}

impl Capabilities {
    /// No optional capability.
    pub const NONE: Self = Self {
        flush: false,
        upgrade: false,
        close_notify: false,
    };
}

/// Pushes buffered response bytes to the client.
pub trait Flush {
    /// Flushes buffered bytes, committing the response head if needed.
    fn flush(&mut self) -> io::Result<()>;
}

/// Hands the underlying connection over to the handler.
pub trait Upgrade {
    /// Takes the pending upgrade. Returns `None` once taken, or when the
    /// request did not ask for an upgrade.
    ///
    /// The future resolves after the response head (normally
    /// `101 Switching Protocols`) has been sent.
    fn take_upgrade(&mut self) -> Option<hyper::upgrade::OnUpgrade>;
}

/// Reports a client disconnect.
pub trait CloseNotify {
    /// Resolves once the client can no longer receive the response.
    fn closed(&self) -> BoxFuture<'static, ()>;
}

/// The response channel a handler writes to.
pub trait ResponseWriter: Send {
    /// Response headers.
    fn headers(&self) -> &HeaderMap;

    /// Mutable response headers. Changes after the head is committed are
    /// not sent.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Sets the response status. Only the first call takes effect, and none
    /// after the head is committed.
    fn write_status(&mut self, status: StatusCode);

    /// Writes body bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Writes the whole buffer, retrying short writes.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ))
                }
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Which optional capabilities this writer supports.
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    /// Flush capability, if supported.
    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        None
    }

    /// Upgrade capability, if supported.
    fn upgrader(&mut self) -> Option<&mut dyn Upgrade> {
        None
    }

    /// Close notification capability, if supported.
    fn close_notifier(&self) -> Option<&dyn CloseNotify> {
        None
    }
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for &mut W {
    fn headers(&self) -> &HeaderMap {
        (**self).headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        (**self).headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        (**self).write_status(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        (**self).flusher()
    }

    fn upgrader(&mut self) -> Option<&mut dyn Upgrade> {
        (**self).upgrader()
    }

    fn close_notifier(&self) -> Option<&dyn CloseNotify> {
        (**self).close_notifier()
    }
}

/// A writer that collects the whole response in memory.
///
/// Supports no optional capability. Convert it into an
/// `http::Response<Full<Bytes>>` with [`BufferedWriter::into_response`].
#[derive(Debug, Default)]
pub struct BufferedWriter {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl BufferedWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed status, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Bytes written so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Builds the response. A writer that was never written to yields
    /// `200 OK` with an empty body.
    #[must_use]
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseWriter for BufferedWriter {
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
        self.status.get_or_insert(StatusCode::OK);
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use http_body_util::BodyExt;

    /// Accepts at most `max` bytes per call.
    struct Trickle {
        inner: BufferedWriter,
        max: usize,
    }

    impl ResponseWriter for Trickle {
        fn headers(&self) -> &HeaderMap {
            self.inner.headers()
        }

        fn headers_mut(&mut self) -> &mut HeaderMap {
            self.inner.headers_mut()
        }

        fn write_status(&mut self, status: StatusCode) {
            self.inner.write_status(status);
        }

        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.max);
            self.inner.write(&buf[..n])
        }
    }

    #[test]
    fn test_buffered_default_status_is_ok() {
        let writer = BufferedWriter::new();
        assert_eq!(writer.into_response().status(), StatusCode::OK);
    }

    #[test]
    fn test_buffered_first_status_sticks() {
        let mut writer = BufferedWriter::new();
        writer.write_status(StatusCode::CREATED);
        writer.write_status(StatusCode::ACCEPTED);
        assert_eq!(writer.status(), Some(StatusCode::CREATED));
    }

    #[test]
    fn test_buffered_write_commits_ok() {
        let mut writer = BufferedWriter::new();
        writer.write_all(b"hi").unwrap();
        writer.write_status(StatusCode::CREATED);
        assert_eq!(writer.status(), Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_buffered_into_response() {
        let mut writer = BufferedWriter::new();
        writer
            .headers_mut()
            .insert(CONTENT_TYPE, "text/plain".parse().unwrap());
        writer.write_status(StatusCode::NOT_FOUND);
        writer.write_all(b"missing").unwrap();

        let response = writer.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"missing");
    }

    #[test]
    fn test_write_all_retries_short_writes() {
        let mut writer = Trickle {
            inner: BufferedWriter::new(),
            max: 3,
        };
        writer.write_all(b"hello world").unwrap();
        assert_eq!(writer.inner.body(), b"hello world");
    }

    #[test]
    fn test_write_all_fails_on_zero_write() {
        let mut writer = Trickle {
            inner: BufferedWriter::new(),
            max: 0,
        };
        let err = writer.write_all(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }

    #[test]
    fn test_buffered_has_no_capabilities() {
        let mut writer = BufferedWriter::new();
        assert_eq!(writer.capabilities(), Capabilities::NONE);
        assert!(writer.flusher().is_none());
        assert!(writer.upgrader().is_none());
        assert!(writer.close_notifier().is_none());
    }

    #[test]
    fn test_mut_ref_delegates() {
        let mut writer = BufferedWriter::new();
        {
            let mut by_ref: &mut dyn ResponseWriter = &mut writer;
            by_ref.write_status(StatusCode::ACCEPTED);
            ResponseWriter::write_all(&mut by_ref, b"ok").unwrap();
        }
        assert_eq!(writer.status(), Some(StatusCode::ACCEPTED));
        assert_eq!(writer.body(), b"ok");
    }
}
