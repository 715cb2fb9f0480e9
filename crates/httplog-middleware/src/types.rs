//! Common types used by handlers and the middleware.

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full};
use std::convert::Infallible;

/// Boxed error type carried by request bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A boxed, streaming request body.
pub type BoxBody = http_body_util::combinators::UnsyncBoxBody<Bytes, BoxError>;

/// The HTTP request type handlers receive.
pub type Request = http::Request<BoxBody>;

/// Creates a body holding `bytes`.
pub fn full(bytes: impl Into<Bytes>) -> BoxBody {
    Full::new(bytes.into())
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

/// Creates an empty body.
#[must_use]
pub fn empty() -> BoxBody {
    Empty::<Bytes>::new()
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}
