//! Response instrumentation.
//!
//! [`RecordingWriter`] decorates a [`ResponseWriter`] and observes the status
//! and byte count of the response without changing what reaches the wrapped
//! writer. Observations live in atomics behind a [`ResponseObserver`] handle,
//! so they can be read from another task while the handler is still writing
//! (for example from a task that flushes a streaming response).

use crate::writer::{Capabilities, CloseNotify, Flush, ResponseWriter, Upgrade};
use http::{HeaderMap, StatusCode};
use std::io;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;

/// `0` in the status slot means no status has been observed yet.
const UNSET: u16 = 0;

#[derive(Debug, Default)]
struct Observation {
    status: AtomicU16,
    bytes_written: AtomicU64,
}

impl Observation {
    /// Records `status` unless one was already observed.
    fn observe_status(&self, status: StatusCode) {
        let _ = self.status.compare_exchange(
            UNSET,
            status.as_u16(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Read-only view of what a [`RecordingWriter`] observed.
#[derive(Debug, Clone)]
pub struct ResponseObserver {
    state: Arc<Observation>,
}

impl ResponseObserver {
    /// The final status, or `None` if nothing was written and no status set.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self.state.status.load(Ordering::Acquire) {
            UNSET => None,
            code => StatusCode::from_u16(code).ok(),
        }
    }

    /// Bytes accepted by the wrapped writer so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.state.bytes_written.load(Ordering::Acquire)
    }
}

/// A [`ResponseWriter`] that records status and bytes written.
///
/// - `write` forwards unchanged and counts the bytes the wrapped writer
///   reports as accepted, so short writes are measured exactly. A write
///   before any status observes `200 OK`, as the wrapped writer applies it.
/// - `write_status` is always forwarded; only the first status is observed.
/// - Capability queries answer exactly as the wrapped writer does.
#[derive(Debug)]
pub struct RecordingWriter<W> {
    inner: W,
    state: Arc<Observation>,
}

impl<W: ResponseWriter> RecordingWriter<W> {
    /// Wraps `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            state: Arc::new(Observation::default()),
        }
    }

    /// The observed status.
    #[must_use]
    pub fn observed_status(&self) -> Option<StatusCode> {
        self.observer().status()
    }

    /// The observed byte count.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.state.bytes_written.load(Ordering::Acquire)
    }

    /// A handle for reading observations from elsewhere.
    #[must_use]
    pub fn observer(&self) -> ResponseObserver {
        ResponseObserver {
            state: Arc::clone(&self.state),
        }
    }

    /// The wrapped writer.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwraps the recorder.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: ResponseWriter> ResponseWriter for RecordingWriter<W> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_status(&mut self, status: StatusCode) {
        self.state.observe_status(status);
        self.inner.write_status(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.observe_status(StatusCode::OK);
        let n = self.inner.write(buf)?;
        self.state
            .bytes_written
            .fetch_add(n as u64, Ordering::AcqRel);
        Ok(n)
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }

    fn flusher(&mut self) -> Option<&mut dyn Flush> {
        if self.inner.flusher().is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn upgrader(&mut self) -> Option<&mut dyn Upgrade> {
        self.inner.upgrader()
    }

    fn close_notifier(&self) -> Option<&dyn CloseNotify> {
        self.inner.close_notifier()
    }
}

impl<W: ResponseWriter> Flush for RecordingWriter<W> {
    /// Flushing commits the head, so a flush before any status observes
    /// `200 OK` just like a write.
    fn flush(&mut self) -> io::Result<()> {
        match self.inner.flusher() {
            Some(flusher) => {
                self.state.observe_status(StatusCode::OK);
                flusher.flush()
            }
            None => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "wrapped writer does not support flushing",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::BoxFuture;
    use crate::writer::BufferedWriter;

    /// Writer supporting every capability, counting flushes.
    #[derive(Default)]
    struct FullFeatured {
        inner: BufferedWriter,
        flushes: usize,
        upgrade_taken: bool,
    }

    impl ResponseWriter for FullFeatured {
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
            self.inner.write(buf)
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities {
                flush: true,
                upgrade: true,
                close_notify: true,
            }
        }

        fn flusher(&mut self) -> Option<&mut dyn Flush> {
            Some(self)
        }

        fn upgrader(&mut self) -> Option<&mut dyn Upgrade> {
            Some(self)
        }

        fn close_notifier(&self) -> Option<&dyn CloseNotify> {
            Some(self)
        }
    }

    impl Flush for FullFeatured {
        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    impl Upgrade for FullFeatured {
        fn take_upgrade(&mut self) -> Option<hyper::upgrade::OnUpgrade> {
            self.upgrade_taken = true;
            None
        }
    }

    impl CloseNotify for FullFeatured {
        fn closed(&self) -> BoxFuture<'static, ()> {
            Box::pin(async {})
        }
    }

    /// Accepts at most `max` bytes per write.
    struct Short {
        inner: BufferedWriter,
        max: usize,
    }

    impl ResponseWriter for Short {
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

    /// Always fails.
    #[derive(Default)]
    struct Broken {
        headers: HeaderMap,
    }

    impl ResponseWriter for Broken {
        fn headers(&self) -> &HeaderMap {
            &self.headers
        }

        fn headers_mut(&mut self) -> &mut HeaderMap {
            &mut self.headers
        }

        fn write_status(&mut self, _status: StatusCode) {}

        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    #[test]
    fn test_nothing_observed_initially() {
        let recorder = RecordingWriter::new(BufferedWriter::new());
        assert_eq!(recorder.observed_status(), None);
        assert_eq!(recorder.bytes_written(), 0);
    }

    #[test]
    fn test_write_without_status_observes_ok() {
        let mut recorder = RecordingWriter::new(BufferedWriter::new());
        recorder.write_all(b"hello").unwrap();
        assert_eq!(recorder.observed_status(), Some(StatusCode::OK));
        assert_eq!(recorder.bytes_written(), 5);
    }

    #[test]
    fn test_first_status_wins_and_all_are_forwarded() {
        let mut recorder = RecordingWriter::new(BufferedWriter::new());
        recorder.write_status(StatusCode::CREATED);
        recorder.write_all(b"x").unwrap();
        recorder.write_status(StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(recorder.observed_status(), Some(StatusCode::CREATED));
        assert_eq!(recorder.get_ref().status(), Some(StatusCode::CREATED));
    }

    #[test]
    fn test_status_after_write_is_not_observed() {
        let mut recorder = RecordingWriter::new(BufferedWriter::new());
        recorder.write_all(b"hi").unwrap();
        recorder.write_status(StatusCode::CREATED);
        assert_eq!(recorder.observed_status(), Some(StatusCode::OK));
        assert_eq!(recorder.into_inner().status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_short_writes_are_counted_exactly() {
        let mut recorder = RecordingWriter::new(Short {
            inner: BufferedWriter::new(),
            max: 4,
        });
        let n = recorder.write(b"0123456789").unwrap();
        assert_eq!(n, 4);
        assert_eq!(recorder.bytes_written(), 4);

        recorder.write_all(b"0123456789").unwrap();
        assert_eq!(recorder.bytes_written(), 14);
    }

    #[test]
    fn test_failed_write_counts_nothing() {
        let mut recorder = RecordingWriter::new(Broken::default());
        assert!(recorder.write(b"abc").is_err());
        assert_eq!(recorder.bytes_written(), 0);
    }

    #[test]
    fn test_flush_passes_through() {
        let mut recorder = RecordingWriter::new(FullFeatured::default());
        assert!(recorder.capabilities().flush);

        recorder.flusher().expect("flush supported").flush().unwrap();
        recorder.flusher().unwrap().flush().unwrap();

        assert_eq!(recorder.get_ref().flushes, 2);
        assert_eq!(recorder.observed_status(), Some(StatusCode::OK));
    }

    #[test]
    fn test_flush_absent_when_wrapped_writer_lacks_it() {
        let mut recorder = RecordingWriter::new(BufferedWriter::new());
        assert!(!recorder.capabilities().flush);
        assert!(recorder.flusher().is_none());
        assert_eq!(
            Flush::flush(&mut recorder).unwrap_err().kind(),
            io::ErrorKind::Unsupported
        );
    }

    #[test]
    fn test_upgrade_and_close_notify_pass_through() {
        let mut recorder = RecordingWriter::new(FullFeatured::default());
        assert_eq!(recorder.capabilities(), recorder.get_ref().capabilities());
        assert!(recorder.close_notifier().is_some());
        assert!(recorder.upgrader().unwrap().take_upgrade().is_none());
        assert!(recorder.get_ref().upgrade_taken);
    }

    #[test]
    fn test_nested_recorders_both_pass_flush_through() {
        let mut outer = RecordingWriter::new(RecordingWriter::new(FullFeatured::default()));
        outer.flusher().unwrap().flush().unwrap();
        assert_eq!(outer.get_ref().get_ref().flushes, 1);
    }

    #[test]
    fn test_observer_reads_concurrently() {
        let mut recorder = RecordingWriter::new(BufferedWriter::new());
        let observer = recorder.observer();

        let reader = std::thread::spawn(move || {
            let mut last = 0;
            for _ in 0..1000 {
                let now = observer.bytes_written();
                assert!(now >= last);
                last = now;
            }
            observer
        });

        for _ in 0..1000 {
            recorder.write_all(b"ab").unwrap();
        }

        let observer = reader.join().unwrap();
        assert_eq!(observer.bytes_written(), 2000);
        assert_eq!(observer.status(), Some(StatusCode::OK));
    }
}
