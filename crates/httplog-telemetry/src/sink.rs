//! Log sinks backed by `tracing` and by plain writers.

use httplog_core::{Fields, HttplogResult, LogSink};
use parking_lot::Mutex;
use serde_json::Value;
use std::io::Write;
use tracing::Level;

/// Target used for records forwarded to `tracing`.
pub const RECORD_TARGET: &str = "httplog";

/// Forwards records to the `tracing` dispatcher.
///
/// Each record becomes one event on target [`RECORD_TARGET`] with the
/// `schema` as a field and the full record serialized under `record`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Creates the sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl LogSink for TracingSink {
    fn emit(&self, level: Level, fields: Fields) -> HttplogResult<()> {
        let schema = fields
            .get("schema")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let message = fields
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let record = Value::Object(fields).to_string();

        if level == Level::ERROR {
            tracing::error!(target: RECORD_TARGET, schema = %schema, record = %record, "{message}");
        } else if level == Level::WARN {
            tracing::warn!(target: RECORD_TARGET, schema = %schema, record = %record, "{message}");
        } else if level == Level::INFO {
            tracing::info!(target: RECORD_TARGET, schema = %schema, record = %record, "{message}");
        } else if level == Level::DEBUG {
            tracing::debug!(target: RECORD_TARGET, schema = %schema, record = %record, "{message}");
        } else {
            tracing::trace!(target: RECORD_TARGET, schema = %schema, record = %record, "{message}");
        }
        Ok(())
    }
}

/// Writes one JSON object per line.
///
/// A `level` field is added when the record does not carry one.
#[derive(Debug)]
pub struct JsonSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> JsonSink<W> {
    /// Creates a sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonSink<std::io::Stdout> {
    /// Creates a sink writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + 'static> LogSink for JsonSink<W> {
    fn emit(&self, level: Level, mut fields: Fields) -> HttplogResult<()> {
        fields
            .entry("level")
            .or_insert_with(|| Value::String(level.as_str().to_ascii_lowercase()));

        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, &fields)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
