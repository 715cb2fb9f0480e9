//! hyper service running a [`Handler`] per request.

use crate::stream::{ChannelBody, StreamingWriter};
use http::header::UPGRADE;
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use httplog_core::RequestContext;
use httplog_middleware::{BoxError, BoxFuture, ConnectionInfo, Handler};
use hyper::body::Incoming;
use std::convert::Infallible;
use std::sync::Arc;

/// Serves requests on one connection with a shared handler.
///
/// Each request runs on its own task with a fresh [`RequestContext`] and a
/// [`StreamingWriter`]. The response is returned to hyper as soon as the
/// handler commits the head; the body streams afterwards.
///
/// A handler that panics before committing the head produces a bare
/// `500 Internal Server Error`. One that panics later aborts the body.
#[derive(Debug)]
pub struct HandlerService<H> {
    handler: Arc<H>,
    connection: ConnectionInfo,
}

impl<H> Clone for HandlerService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            connection: self.connection,
        }
    }
}

impl<H: Handler> HandlerService<H> {
    /// Creates a service for a connection described by `connection`.
    pub fn new(handler: Arc<H>, connection: ConnectionInfo) -> Self {
        Self {
            handler,
            connection,
        }
    }
}

impl<H: Handler> hyper::service::Service<Request<Incoming>> for HandlerService<H> {
    type Response = Response<ChannelBody>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn call(&self, mut request: Request<Incoming>) -> Self::Future {
        let upgrade = request
            .headers()
            .contains_key(UPGRADE)
            .then(|| hyper::upgrade::on(&mut request));

        let (mut parts, body) = request.into_parts();
        parts.extensions.insert(self.connection);
        let request = Request::from_parts(
            parts,
            body.map_err(|e| -> BoxError { Box::new(e) }).boxed_unsync(),
        );

        let (writer, head) = StreamingWriter::new(upgrade);
        let handler = Arc::clone(&self.handler);
        let task = tokio::spawn(async move {
            let mut writer = writer;
            let mut ctx = RequestContext::new();
            handler.serve(&mut ctx, request, &mut writer).await;
            writer.finish().await;
        });

        Box::pin(async move {
            if let Ok(response) = head.await {
                return Ok(response);
            }
            match task.await {
                Err(e) if e.is_panic() => tracing::error!("handler panicked before responding"),
                Err(e) => tracing::error!(error = %e, "handler task failed before responding"),
                Ok(()) => {}
            }
            let mut response = Response::new(ChannelBody::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            Ok(response)
        })
    }
}
