//! Request and transaction id sources.
//!
//! The access log layer asks a [`RequestIdFn`] for the request id once per
//! request, and hands a [`TransactionIdFn`] to downstream code which calls it
//! for every event it builds. Both default to a fixed placeholder. The
//! sources here generate UUID v7 ids instead, optionally trusting an id the
//! caller already assigned.
//!
//! UUID v7 is used because it is:
//! - Time-ordered (naturally sortable)
//! - Globally unique without coordination

use crate::types::Request;
use httplog_core::id::{placeholder_id, uuid_v7_id};
use httplog_core::{RequestContext, TransactionIdFn};
use http::header::HeaderName;
use std::sync::Arc;

/// The conventional header carrying a caller-assigned request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest incoming id accepted by [`header_or_uuid`].
pub const MAX_INCOMING_ID_LEN: usize = 128;

/// Derives the request id from the inbound request.
pub type RequestIdFn = Arc<dyn Fn(&Request) -> String + Send + Sync>;

/// Always returns the placeholder id.
#[must_use]
pub fn placeholder_request_id() -> RequestIdFn {
    Arc::new(|_: &Request| placeholder_id())
}

/// Always returns the placeholder id.
#[must_use]
pub fn placeholder_transaction_id() -> TransactionIdFn {
    Arc::new(|_: &RequestContext| placeholder_id())
}

/// Generates a fresh UUID v7 per request.
#[must_use]
pub fn uuid_request_id() -> RequestIdFn {
    Arc::new(|_: &Request| uuid_v7_id())
}

/// Generates a fresh UUID v7 per event.
#[must_use]
pub fn uuid_transaction_id() -> TransactionIdFn {
    Arc::new(|_: &RequestContext| uuid_v7_id())
}

/// Uses the id found in `header`, or generates a UUID v7 when the header is
/// missing or not a usable id.
///
/// Only enable this for traffic from callers trusted to assign ids, such as
/// internal service-to-service calls.
#[must_use]
pub fn header_or_uuid(header: HeaderName) -> RequestIdFn {
    Arc::new(move |request: &Request| {
        request
            .headers()
            .get(&header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| is_acceptable_id(id))
            .map_or_else(uuid_v7_id, ToString::to_string)
    })
}

fn is_acceptable_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_INCOMING_ID_LEN
        && id.bytes().all(|b| b.is_ascii_graphic())
}
