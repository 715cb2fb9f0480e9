//! # httplog middleware
//!
//! Access logging around an HTTP handler.
//!
//! ```text
//! Request → AccessLogHandler ─ Start ─ Dispatch ─→ Handler
//!                                                     ↓
//! Sink   ← AccessRecord ← Finalize ←─────────────────┘
//! ```
//!
//! | Piece                  | Purpose                                          |
//! |------------------------|--------------------------------------------------|
//! | [`RecordingWriter`]    | Observes status and bytes written                |
//! | [`RecordingBody`]      | Counts request body bytes read                   |
//! | [`redact_query`]       | Masks sensitive query parameters                 |
//! | [`AccessLogConfig`]    | Service identity, tags, id sources, redaction    |
//! | [`AccessLogMiddleware`]| Builds and emits the access record               |
//!
//! Code behind the middleware builds correlated events from the
//! [`RequestContext`]:
//!
//! ```
//! use httplog_middleware::{full, AccessLogConfig, BufferedWriter, FnHandler, Handler};
//! use httplog_core::{MemorySink, RequestContext};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let sink = MemorySink::new();
//! let handler = AccessLogConfig::builder()
//!     .service("billing")
//!     .sink(Arc::new(sink.clone()))
//!     .build()
//!     .unwrap()
//!     .wrap(FnHandler::new(|ctx, _request, writer| {
//!         Box::pin(async move {
//!             let event = ctx.new_event().unwrap().with_action("charged");
//!             ctx.logger().unwrap().info(&event).unwrap();
//!             writer.write_all(b"ok").unwrap();
//!         })
//!     }));
//!
//! let mut ctx = RequestContext::new();
//! let mut writer = BufferedWriter::new();
//! handler.serve(&mut ctx, http::Request::new(full("")), &mut writer).await;
//!
//! assert_eq!(sink.with_schema("event").len(), 1);
//! assert_eq!(sink.with_schema("access").len(), 1);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/httplog-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod access_log;
mod body;
pub mod config;
mod connection;
mod handler;
mod recorder;
mod redact;
pub mod request_id;
pub mod settings;
pub mod types;
pub mod writer;

pub use access_log::{AccessLogHandler, AccessLogMiddleware};
pub use body::{ByteCounter, RecordingBody};
pub use config::{AccessLogConfig, AccessLogConfigBuilder};
pub use connection::ConnectionInfo;
pub use handler::{BoxFuture, FnHandler, Handler};
pub use httplog_core::RequestContext;
pub use recorder::{RecordingWriter, ResponseObserver};
pub use redact::{normalize_query, redact_query, REDACTED};
pub use request_id::{header_or_uuid, RequestIdFn, REQUEST_ID_HEADER};
pub use settings::AccessLogSettings;
pub use types::{empty, full, BoxBody, BoxError, Request};
pub use writer::{BufferedWriter, Capabilities, CloseNotify, Flush, ResponseWriter, Upgrade};
