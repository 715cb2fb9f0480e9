//! Access log middleware.
//!
//! [`AccessLogMiddleware`] wraps a [`Handler`] and emits exactly one
//! [`AccessRecord`] per request that returns. Each request moves through
//! three steps:
//!
//! 1. **Start** - static tags are set on the per-request logger, the
//!    identity snapshot ([`BaseRecord`]) is captured and the request side of
//!    the access record is filled in, including the redacted query.
//! 2. **Dispatch** - the snapshot and transaction id source are bound into
//!    the [`RequestContext`], body and writer are wrapped, and the inner
//!    handler runs.
//! 3. **Finalize** - duration, status, byte counts and response content type
//!    are read from the wrappers and the record is emitted at info level.
//!
//! A panic in the inner handler unwinds straight through Finalize, so no
//! access record is emitted for that request.
//!
//! # Example
//!
//! ```rust,ignore
//! use httplog_middleware::{AccessLogConfig, FnHandler};
//!
//! let app = FnHandler::new(|ctx, _request, writer| {
//!     Box::pin(async move {
//!         if let Ok(event) = ctx.new_event() {
//!             let _ = ctx.logger().map(|log| log.info(&event.with_action("viewed")));
//!         }
//!         let _ = writer.write_all(b"ok");
//!     })
//! });
//!
//! let handler = AccessLogConfig::builder()
//!     .service("billing")
//!     .redact(["token"])
//!     .build()?
//!     .wrap(app);
//! ```

use crate::body::RecordingBody;
use crate::config::AccessLogConfig;
use crate::connection::ConnectionInfo;
use crate::handler::{BoxFuture, Handler};
use crate::recorder::RecordingWriter;
use crate::redact::redact_query;
use crate::types::Request;
use crate::writer::ResponseWriter;
use http::header::{AsHeaderName, CONTENT_TYPE, HOST, REFERER, USER_AGENT};
use http::HeaderMap;
use http_body_util::BodyExt;
use httplog_core::{AccessRecord, BaseRecord, HttplogResult, RequestContext};
use std::sync::Arc;
use std::time::Instant;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Emits one access record per request.
#[derive(Debug, Clone)]
pub struct AccessLogMiddleware {
    config: Arc<AccessLogConfig>,
}

impl AccessLogMiddleware {
    /// Creates the middleware after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`httplog_core::HttplogError::InvalidConfig`] when the
    /// configuration is rejected by [`AccessLogConfig::validate`].
    pub fn new(config: AccessLogConfig) -> HttplogResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &AccessLogConfig {
        &self.config
    }

    /// Wraps `next`. The middleware can wrap any number of handlers.
    #[must_use]
    pub fn wrap<H: Handler>(&self, next: H) -> AccessLogHandler<H> {
        AccessLogHandler {
            config: Arc::clone(&self.config),
            next,
        }
    }
}

/// A handler wrapped by [`AccessLogMiddleware`].
#[derive(Debug, Clone)]
pub struct AccessLogHandler<H> {
    config: Arc<AccessLogConfig>,
    next: H,
}

impl<H> AccessLogHandler<H> {
    /// The wrapped handler.
    pub fn inner(&self) -> &H {
        &self.next
    }
}

impl<H: Handler> Handler for AccessLogHandler<H> {
    fn serve<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        writer: &'a mut dyn ResponseWriter,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            // Start
            let logger = ctx.logger_or_install(&self.config.sink).clone();
            for (key, value) in &self.config.tags {
                logger.set_field(key.as_str(), value.clone());
            }
            let mut record = start(&self.config, &request);

            // Dispatch
            ctx.bind_log_context(record.base.clone(), Arc::clone(&self.config.transaction_id));
            let (parts, body) = request.into_parts();
            let body = RecordingBody::new(body);
            let bytes_in = body.counter();
            let request = http::Request::from_parts(parts, body.boxed_unsync());
            let mut recorder = RecordingWriter::new(writer);
            let started = Instant::now();

            self.next.serve(ctx, request, &mut recorder).await;

            // Finalize
            record.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            record.status = recorder
                .observed_status()
                .map_or(http::StatusCode::OK.as_u16(), |s| s.as_u16());
            record.bytes_out = recorder.bytes_written();
            record.bytes_in = bytes_in.get();
            record.bytes = record.bytes_in.saturating_add(record.bytes_out);
            record.response_content_type = header_str(recorder.headers(), CONTENT_TYPE);

            tracing::debug!(
                method = %record.method,
                path = %record.uri_path,
                status = record.status,
                duration_ms = record.duration_ms,
                "request completed"
            );
            if let Err(e) = logger.info(&record) {
                tracing::warn!(error = %e, "failed to emit access record");
            }
        })
    }
}

/// Captures the identity snapshot and the request side of the record.
fn start(config: &AccessLogConfig, request: &Request) -> AccessRecord {
    let connection = request
        .extensions()
        .get::<ConnectionInfo>()
        .copied()
        .unwrap_or_default();

    let base = BaseRecord {
        service: config.service.clone(),
        version: config.version.clone(),
        host: config.host.clone(),
        environment: config.environment.clone(),
        request_id: (config.request_id)(request),
        ..Default::default()
    };

    let headers = request.headers();
    let uri = request.uri();
    let mut record = AccessRecord::new(base);
    record.source_ip = connection.source_ip();
    record.forwarded_for = header_str(headers, X_FORWARDED_FOR);
    record.destination_ip = connection.destination_ip();
    record.destination_port = connection.destination_port();
    record.site = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
        .or_else(|| uri.authority().map(ToString::to_string))
        .unwrap_or_default();
    record.request_content_type = header_str(headers, CONTENT_TYPE);
    record.method = request.method().to_string();
    record.referrer = header_str(headers, REFERER);
    record.user_agent = header_str(headers, USER_AGENT);
    record.uri_path = uri.path().to_string();
    record.uri_query = uri
        .query()
        .map(|query| redact_query(query, &config.redact))
        .unwrap_or_default();
    record.scheme = uri.scheme_str().unwrap_or_default().to_string();
    record
}

fn header_str<K: AsHeaderName>(headers: &HeaderMap, name: K) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
