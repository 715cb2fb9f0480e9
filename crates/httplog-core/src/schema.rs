//! Event schema model.
//!
//! Every record emitted by httplog is one of three shapes, distinguished on
//! the wire by the `schema` field so that a log pipeline can dispatch on shape
//! without knowing the producing type:
//!
//! | Type                 | `schema`      | Emitted by                         |
//! |----------------------|---------------|------------------------------------|
//! | [`BaseRecord`]       | `developer`   | application code (bare identity)   |
//! | [`AccessRecord`]     | `access`      | the access log middleware, once    |
//! | [`ApplicationEvent`] | `event`       | application code, zero or more     |
//!
//! # Wire names
//!
//! Field names on the wire are fixed by `serde` renames and must not change
//! without a schema version bump:
//!
//! | Field                          | Wire name                   |
//! |--------------------------------|-----------------------------|
//! | `dirty_fields`                 | `ugc_dirty`                 |
//! | `environment`                  | `env`                       |
//! | `source_ip`                    | `src_ip`                    |
//! | `destination_ip`               | `dest_ip`                   |
//! | `destination_port`             | `port`                      |
//! | `site`                         | `site`                      |
//! | `request_content_type`         | `http_request_content_type` |
//! | `method`                       | `http_method`               |
//! | `referrer`                     | `http_referrer`             |
//! | `user_agent`                   | `http_user_agent`           |
//! | `response_content_type`        | `http_content_type`         |
//! | `duration_ms`                  | `duration`                  |
//!
//! All other fields use their Rust name.
//!
//! # Richer schemas
//!
//! Applications extend [`ApplicationEvent`] by flattening it into their own
//! type and advertising a schema name of their own:
//!
//! ```
//! use httplog_core::{ApplicationEvent, LogEvent};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Checkout {
//!     #[serde(flatten)]
//!     event: ApplicationEvent,
//!     cart_total: u64,
//! }
//!
//! impl LogEvent for Checkout {
//!     fn schema(&self) -> &str {
//!         "checkout"
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Schema identifier of a bare [`BaseRecord`].
pub const DEVELOPER_SCHEMA: &str = "developer";

/// Schema identifier of an [`AccessRecord`].
pub const ACCESS_SCHEMA: &str = "access";

/// Schema identifier of an [`ApplicationEvent`].
pub const EVENT_SCHEMA: &str = "event";

/// Wire names owned by the record itself.
///
/// Static tags must not use these: `schema` is what log pipelines dispatch
/// on, and the rest are filled by the logger or the access log middleware.
pub const RESERVED_FIELDS: &[&str] = &[
    "schema",
    "message",
    "time",
    "service",
    "version",
    "host",
    "env",
    "ugc_dirty",
    "request_id",
    "src_ip",
    "forwarded_for",
    "dest_ip",
    "port",
    "site",
    "http_request_content_type",
    "http_method",
    "http_referrer",
    "http_user_agent",
    "uri_path",
    "uri_query",
    "scheme",
    "http_content_type",
    "status",
    "bytes_in",
    "bytes_out",
    "bytes",
    "duration",
];

/// Whether `name` is one of [`RESERVED_FIELDS`].
#[must_use]
pub fn is_reserved_field(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// A record that can be handed to a log sink.
///
/// The schema identifier is written into the emitted `schema` field unless
/// the record serializes one itself.
pub trait LogEvent: Serialize {
    /// The schema identifier advertised on the wire.
    fn schema(&self) -> &str;

    /// Human readable message. Defaults to the schema name when `None`.
    fn message(&self) -> Option<&str> {
        None
    }
}

/// Identity fields shared by every record emitted for one request.
///
/// A snapshot is captured once per request by the access log middleware and
/// is never mutated afterwards. The timestamp is left empty in the snapshot
/// and stamped by the logger at emission time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseRecord {
    /// Name of the running service.
    pub service: String,

    /// Service version.
    pub version: String,

    /// Name of the host the service runs on.
    pub host: String,

    /// Deployment environment.
    #[serde(rename = "env")]
    pub environment: String,

    /// Names of fields holding user generated content.
    #[serde(rename = "ugc_dirty", default)]
    pub dirty_fields: Vec<String>,

    /// Request identifier.
    pub request_id: String,

    /// Emission timestamp (RFC 3339).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub time: String,
}

impl BaseRecord {
    /// Marks a field as carrying user generated content.
    pub fn mark_dirty(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.dirty_fields.contains(&field) {
            self.dirty_fields.push(field);
        }
    }
}

impl LogEvent for BaseRecord {
    fn schema(&self) -> &str {
        DEVELOPER_SCHEMA
    }
}

/// One record per request summarising the request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRecord {
    /// Identity fields.
    #[serde(flatten)]
    pub base: BaseRecord,

    /// Client IP address from the connection.
    #[serde(rename = "src_ip")]
    pub source_ip: String,

    /// Raw `X-Forwarded-For` header value.
    pub forwarded_for: String,

    /// Local IP address that accepted the connection.
    #[serde(rename = "dest_ip")]
    pub destination_ip: String,

    /// Local port that accepted the connection.
    #[serde(rename = "port", default, skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<u16>,

    /// Virtual host the request was addressed to.
    pub site: String,

    /// Request `Content-Type`.
    #[serde(rename = "http_request_content_type")]
    pub request_content_type: String,

    /// HTTP method.
    #[serde(rename = "http_method")]
    pub method: String,

    /// `Referer` header value.
    #[serde(rename = "http_referrer")]
    pub referrer: String,

    /// `User-Agent` header value.
    #[serde(rename = "http_user_agent")]
    pub user_agent: String,

    /// URI path.
    pub uri_path: String,

    /// URI query, with configured parameters redacted.
    pub uri_query: String,

    /// URI scheme, empty for origin-form request targets.
    pub scheme: String,

    /// Response `Content-Type`.
    #[serde(rename = "http_content_type")]
    pub response_content_type: String,

    /// Response status code.
    pub status: u16,

    /// Bytes read from the request body.
    pub bytes_in: u64,

    /// Bytes written to the response body.
    pub bytes_out: u64,

    /// `bytes_in + bytes_out`.
    pub bytes: u64,

    /// Handler duration in milliseconds.
    #[serde(rename = "duration")]
    pub duration_ms: u64,

    /// Human readable message.
    pub message: String,
}

impl AccessRecord {
    /// Creates an access record skeleton around a base snapshot.
    #[must_use]
    pub fn new(base: BaseRecord) -> Self {
        Self {
            base,
            source_ip: String::new(),
            forwarded_for: String::new(),
            destination_ip: String::new(),
            destination_port: None,
            site: String::new(),
            request_content_type: String::new(),
            method: String::new(),
            referrer: String::new(),
            user_agent: String::new(),
            uri_path: String::new(),
            uri_query: String::new(),
            scheme: String::new(),
            response_content_type: String::new(),
            status: 0,
            bytes_in: 0,
            bytes_out: 0,
            bytes: 0,
            duration_ms: 0,
            message: ACCESS_SCHEMA.to_string(),
        }
    }
}

impl Default for AccessRecord {
    fn default() -> Self {
        Self::new(BaseRecord::default())
    }
}

impl LogEvent for AccessRecord {
    fn schema(&self) -> &str {
        ACCESS_SCHEMA
    }

    fn message(&self) -> Option<&str> {
        Some(&self.message)
    }
}

/// An application level event correlated with the request it happened in.
///
/// Build these with [`RequestContext::new_event`](crate::RequestContext::new_event)
/// rather than by hand so that identity fields and the transaction id are
/// filled consistently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationEvent {
    /// Identity fields.
    #[serde(flatten)]
    pub base: BaseRecord,

    /// Acting user.
    pub user: String,

    /// Identifier of the object acted on.
    pub object_id: String,

    /// Type of the object acted on.
    pub object_type: String,

    /// Status code of the action, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Outcome of the action.
    pub result: String,

    /// Action label.
    pub action: String,

    /// Session identifier.
    pub session_id: String,

    /// Transaction identifier, unique per event.
    pub transaction_id: String,
}

impl ApplicationEvent {
    /// Sets the acting user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Sets the object acted on.
    pub fn with_object(mut self, object_type: impl Into<String>, object_id: impl Into<String>) -> Self {
        self.object_type = object_type.into();
        self.object_id = object_id.into();
        self
    }

    /// Sets the action label.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Sets the outcome.
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = result.into();
        self
    }

    /// Sets the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the session identifier.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }
}

impl LogEvent for ApplicationEvent {
    fn schema(&self) -> &str {
        EVENT_SCHEMA
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> BaseRecord {
        BaseRecord {
            service: "billing".to_string(),
            version: "1.2.3".to_string(),
            host: "node-1".to_string(),
            environment: "staging".to_string(),
            dirty_fields: vec![],
            request_id: "req-1".to_string(),
            time: String::new(),
        }
    }

    #[test]
    fn test_schema_identifiers() {
        assert_eq!(base().schema(), "developer");
        assert_eq!(AccessRecord::default().schema(), "access");
        assert_eq!(ApplicationEvent::default().schema(), "event");
    }

    #[test]
    fn test_access_message_defaults_to_schema() {
        let record = AccessRecord::new(base());
        assert_eq!(record.message, "access");
        assert_eq!(record.message(), Some("access"));
    }

    #[test]
    fn test_base_wire_names() {
        let value = serde_json::to_value(base()).unwrap();
        assert_eq!(
            value,
            json!({
                "service": "billing",
                "version": "1.2.3",
                "host": "node-1",
                "env": "staging",
                "ugc_dirty": [],
                "request_id": "req-1",
            })
        );
    }

    #[test]
    fn test_access_wire_names() {
        let mut record = AccessRecord::new(base());
        record.source_ip = "10.0.0.1".to_string();
        record.destination_ip = "10.0.0.2".to_string();
        record.destination_port = Some(8080);
        record.method = "POST".to_string();
        record.request_content_type = "application/json".to_string();
        record.response_content_type = "text/plain".to_string();
        record.duration_ms = 12;

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["service"], "billing");
        assert_eq!(value["env"], "staging");
        assert_eq!(value["src_ip"], "10.0.0.1");
        assert_eq!(value["dest_ip"], "10.0.0.2");
        assert_eq!(value["port"], 8080);
        assert_eq!(value["http_method"], "POST");
        assert_eq!(value["http_request_content_type"], "application/json");
        assert_eq!(value["http_content_type"], "text/plain");
        assert_eq!(value["duration"], 12);
        assert_eq!(value["message"], "access");
    }

    #[test]
    fn test_unknown_port_is_omitted() {
        let value = serde_json::to_value(AccessRecord::new(base())).unwrap();
        assert!(value.get("port").is_none());
        assert_eq!(value["dest_ip"], "");
    }

    #[test]
    fn test_event_builders() {
        let event = ApplicationEvent {
            base: base(),
            ..Default::default()
        }
        .with_user("alice")
        .with_object("invoice", "inv-9")
        .with_action("refund")
        .with_result("ok")
        .with_status(202)
        .with_session_id("s-1");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["user"], "alice");
        assert_eq!(value["object_type"], "invoice");
        assert_eq!(value["object_id"], "inv-9");
        assert_eq!(value["action"], "refund");
        assert_eq!(value["status"], 202);
        assert_eq!(value["session_id"], "s-1");
        assert_eq!(value["request_id"], "req-1");
    }

    #[test]
    fn test_mark_dirty_deduplicates() {
        let mut record = base();
        record.mark_dirty("comment");
        record.mark_dirty("comment");
        assert_eq!(record.dirty_fields, vec!["comment".to_string()]);
    }

    #[test]
    fn test_access_record_deserializes_emitted_shape() {
        let record = AccessRecord::new(base());
        let mut value = serde_json::to_value(&record).unwrap();
        value["schema"] = json!("access");
        value["time"] = json!("2024-01-01T00:00:00.000Z");

        let parsed: AccessRecord = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.base.request_id, "req-1");
        assert_eq!(parsed.base.time, "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_every_access_wire_name_is_reserved() {
        let mut record = AccessRecord::new(base());
        record.destination_port = Some(443);
        let value = serde_json::to_value(&record).unwrap();

        for key in value.as_object().unwrap().keys() {
            assert!(is_reserved_field(key), "{key} is not reserved");
        }
        assert!(is_reserved_field("schema"));
        assert!(!is_reserved_field("team"));
    }
}
