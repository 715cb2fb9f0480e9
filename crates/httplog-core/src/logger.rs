//! Per-request logger and log sinks.
//!
//! A [`LogSink`] is the outbound end of httplog: it receives a fully
//! populated record as a JSON object and takes care of serialization and
//! transport. A [`RequestLogger`] sits in front of a sink for the lifetime of
//! one request and carries static fields (tags) that are merged into every
//! record it emits.

use crate::error::{HttplogError, HttplogResult};
use crate::schema::LogEvent;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::Level;

/// A record as handed to a sink.
pub type Fields = Map<String, Value>;

/// Destination for emitted records.
pub trait LogSink: Send + Sync + 'static {
    /// Emits one record at the given severity.
    fn emit(&self, level: Level, fields: Fields) -> HttplogResult<()>;
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn emit(&self, level: Level, fields: Fields) -> HttplogResult<()> {
        (**self).emit(level, fields)
    }
}

/// Returns the current time in the format used for the `time` field.
#[must_use]
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Logger scoped to a single request.
///
/// Cloning is cheap; clones share the same field set and sink, so a clone
/// handed to a spawned task sees fields set afterwards.
#[derive(Clone)]
pub struct RequestLogger {
    sink: Arc<dyn LogSink>,
    fields: Arc<Mutex<Fields>>,
}

impl RequestLogger {
    /// Creates a logger writing to `sink` with no static fields.
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            fields: Arc::new(Mutex::new(Map::new())),
        }
    }

    /// Sets a static field included in every record emitted afterwards.
    ///
    /// A field of the same name on the record itself takes precedence.
    pub fn set_field(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.lock().insert(key.into(), value.into());
    }

    /// Returns a copy of the static fields.
    #[must_use]
    pub fn fields(&self) -> Fields {
        self.fields.lock().clone()
    }

    /// Emits a record at `level`.
    ///
    /// The record is serialized to a JSON object and merged over the static
    /// fields. `schema` and `message` always come from the record, falling
    /// back to the [`LogEvent`] when it does not serialize them, and `time`
    /// is stamped when empty.
    pub fn emit<E: LogEvent + ?Sized>(&self, level: Level, event: &E) -> HttplogResult<()> {
        let record = match serde_json::to_value(event)? {
            Value::Object(map) => map,
            other => return Err(HttplogError::NotAnObject(kind(&other))),
        };

        let schema = record
            .get("schema")
            .cloned()
            .unwrap_or_else(|| Value::String(event.schema().to_string()));
        let message = record.get("message").cloned().unwrap_or_else(|| {
            Value::String(event.message().unwrap_or_else(|| event.schema()).to_string())
        });

        let mut fields = self.fields();
        fields.extend(record);
        fields.insert("schema".to_string(), schema);
        fields.insert("message".to_string(), message);

        let needs_time = fields
            .get("time")
            .and_then(Value::as_str)
            .map_or(true, str::is_empty);
        if needs_time {
            fields.insert("time".to_string(), Value::String(timestamp()));
        }

        self.sink.emit(level, fields)
    }

    /// Emits a record at info level.
    pub fn info<E: LogEvent + ?Sized>(&self, event: &E) -> HttplogResult<()> {
        self.emit(Level::INFO, event)
    }

    /// Emits a record at warn level.
    pub fn warn<E: LogEvent + ?Sized>(&self, event: &E) -> HttplogResult<()> {
        self.emit(Level::WARN, event)
    }

    /// Emits a record at error level.
    pub fn error<E: LogEvent + ?Sized>(&self, event: &E) -> HttplogResult<()> {
        self.emit(Level::ERROR, event)
    }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("fields", &*self.fields.lock())
            .finish_non_exhaustive()
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A record captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedRecord {
    /// Severity it was emitted at.
    pub level: Level,
    /// The emitted fields.
    pub fields: Fields,
}

impl CapturedRecord {
    /// Returns the `schema` field, if present.
    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        self.fields.get("schema").and_then(Value::as_str)
    }

    /// Returns a string field, if present.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Returns an integer field, if present.
    #[must_use]
    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(Value::as_u64)
    }
}

/// Sink that keeps records in memory.
///
/// Clones share storage, so a test can keep one handle and give another to
/// the middleware.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<CapturedRecord>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every captured record in emission order.
    #[must_use]
    pub fn records(&self) -> Vec<CapturedRecord> {
        self.records.lock().clone()
    }

    /// Returns the captured records whose `schema` equals `schema`.
    #[must_use]
    pub fn with_schema(&self, schema: &str) -> Vec<CapturedRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.schema() == Some(schema))
            .cloned()
            .collect()
    }

    /// Number of captured records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drops all captured records.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LogSink for MemorySink {
    fn emit(&self, level: Level, fields: Fields) -> HttplogResult<()> {
        self.records.lock().push(CapturedRecord { level, fields });
        Ok(())
    }
}
