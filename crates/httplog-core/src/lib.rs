//! # httplog core
//!
//! Core types shared by the httplog crates:
//!
//! - [`BaseRecord`], [`AccessRecord`], [`ApplicationEvent`] - the event schema
//! - [`RequestContext`] - per-request context carrying the identity snapshot
//! - [`RequestLogger`] and [`LogSink`] - emission of records
//! - [`HttplogError`] - the error type

#![doc(html_root_url = "https://docs.rs/httplog-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
pub mod id;
mod logger;
pub mod schema;

pub use context::{LogContext, RequestContext, TransactionIdFn};
pub use error::{HttplogError, HttplogResult};
pub use logger::{timestamp, CapturedRecord, Fields, LogSink, MemorySink, RequestLogger};
pub use schema::{
    is_reserved_field, AccessRecord, ApplicationEvent, BaseRecord, LogEvent, RESERVED_FIELDS,
};
