//! Logging setup and sinks for httplog.
//!
//! - [`init_logging`] installs a JSON or pretty `tracing-subscriber` registry
//! - [`TracingSink`] forwards records to `tracing`
//! - [`JsonSink`] writes records as JSON lines to any writer
//!
//! # Example
//!
//! ```rust,ignore
//! use httplog_telemetry::{init_logging, LogConfig, TracingSink};
//!
//! init_logging(&LogConfig::production())?;
//! let sink = std::sync::Arc::new(TracingSink::new());
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod sink;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig};
pub use sink::{JsonSink, TracingSink, RECORD_TARGET};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
