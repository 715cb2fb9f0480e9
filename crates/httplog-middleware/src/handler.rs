//! The handler trait that the access log layer wraps.
//!
//! A [`Handler`] receives the per-request [`RequestContext`], the request and
//! the response channel. Layers such as [`AccessLogHandler`] implement the
//! same trait around an inner handler, so they stack freely.
//!
//! [`AccessLogHandler`]: crate::AccessLogHandler
//!
//! # Example
//!
//! ```ignore
//! use httplog_middleware::{FnHandler, ResponseWriter};
//!
//! let hello = FnHandler::new(|_ctx, _request, writer| {
//!     Box::pin(async move {
//!         let _ = writer.write_all(b"hello");
//!     })
//! });
//! ```

use crate::types::Request;
use crate::writer::ResponseWriter;
use httplog_core::RequestContext;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Serves one request by writing to a [`ResponseWriter`].
///
/// # Invariants
///
/// - A handler writes its response through `writer` only
/// - A wrapping handler MUST pass the context on to the handler it wraps
pub trait Handler: Send + Sync + 'static {
    /// Serves `request`.
    fn serve<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        writer: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a, ()>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        writer: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a, ()> {
        (**self).serve(ctx, request, writer)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn serve<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        writer: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a, ()> {
        (**self).serve(ctx, request, writer)
    }
}

/// A handler built from a closure returning a [`BoxFuture`].
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F>
where
    F: for<'a> Fn(
            &'a mut RequestContext,
            Request,
            &'a mut dyn ResponseWriter,
        ) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    /// Creates a handler from `func`.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(
            &'a mut RequestContext,
            Request,
            &'a mut dyn ResponseWriter,
        ) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    fn serve<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        writer: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a, ()> {
        (self.func)(ctx, request, writer)
    }
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::full;
    use crate::writer::BufferedWriter;
    use http::StatusCode;

    #[tokio::test]
    async fn test_fn_handler_writes_response() {
        let handler = FnHandler::new(|_ctx, _request, writer| {
            Box::pin(async move {
                writer.write_status(StatusCode::ACCEPTED);
                writer.write_all(b"queued").unwrap();
            })
        });

        let mut ctx = RequestContext::new();
        let mut writer = BufferedWriter::new();
        let request = http::Request::new(full(""));
        handler.serve(&mut ctx, request, &mut writer).await;

        assert_eq!(writer.status(), Some(StatusCode::ACCEPTED));
        assert_eq!(writer.body(), b"queued");
    }

    #[tokio::test]
    async fn test_shared_handler_delegates() {
        let handler: Arc<dyn Handler> = Arc::new(FnHandler::new(|_ctx, _request, writer| {
            Box::pin(async move {
                writer.write_all(b"shared").unwrap();
            })
        }));

        let mut ctx = RequestContext::new();
        let mut writer = BufferedWriter::new();
        handler
            .serve(&mut ctx, http::Request::new(full("")), &mut writer)
            .await;

        assert_eq!(writer.body(), b"shared");
    }
}
