//! # httplog
//!
//! **Structured access logs for HTTP services**
//!
//! Wrap a handler with the access log middleware and every request produces
//! exactly one `access` record once the handler returns. The record carries
//! the request line, peer addresses, redacted query, response status, byte
//! counts in both directions and the handling duration. Application events
//! logged through the per-request logger share the request's identity.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use httplog::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging(&LogConfig::default())?;
//!
//!     let app = FnHandler::new(|_ctx, _request, writer| {
//!         Box::pin(async move {
//!             let _ = writer.write_all(b"hello");
//!         })
//!     });
//!
//!     let handler = AccessLogConfig::builder()
//!         .service("greeter")
//!         .redact(["token"])
//!         .build()?
//!         .wrap(app);
//!
//!     Server::bind("0.0.0.0:8080")
//!         .await?
//!         .serve_with_shutdown(handler, shutdown_signal())
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request flow
//!
//! ```text
//! Request → start record → bind log context → count body → Handler
//!                                                             ↓
//! access record ← finalize (status, bytes, duration) ←────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/httplog/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export event model and per-request context
pub use httplog_core as core;

// Re-export middleware types
pub use httplog_middleware as middleware;

// Re-export subscriber setup and sinks
pub use httplog_telemetry as telemetry;

// Re-export server types
pub use httplog_server as server;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use httplog::prelude::*;
/// ```
pub mod prelude {
    pub use httplog_core::{
        AccessRecord, ApplicationEvent, BaseRecord, HttplogError, HttplogResult, LogEvent,
        LogSink, MemorySink, RequestContext, RequestLogger,
    };

    pub use httplog_middleware::{
        AccessLogConfig, AccessLogMiddleware, AccessLogSettings, BoxFuture, FnHandler, Handler,
        Request, ResponseWriter,
    };

    pub use httplog_telemetry::{init_logging, JsonSink, LogConfig, TracingSink};

    pub use httplog_server::{shutdown_signal, Server};
}
