//! # httplog-server
//!
//! hyper transport for httplog handlers.
//!
//! Accepts HTTP/1.1 connections, hands each request to a [`Handler`] with a
//! streaming [`ResponseWriter`], and records the peer and local addresses
//! as a [`ConnectionInfo`] request extension so access records can report
//! them. The writer supports flushing, close notification and, when the
//! client asks for one, protocol upgrades.
//!
//! [`Handler`]: httplog_middleware::Handler
//! [`ResponseWriter`]: httplog_middleware::ResponseWriter
//! [`ConnectionInfo`]: httplog_middleware::ConnectionInfo

#![doc(html_root_url = "https://docs.rs/httplog-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod server;
mod service;
mod stream;

pub use error::{ServerError, ServerResult};
pub use server::{shutdown_signal, Server};
pub use service::HandlerService;
pub use stream::{ChannelBody, StreamingWriter, CHANNEL_CAPACITY, FLUSH_THRESHOLD, MAX_BUFFERED};
