//! Access log configuration.

use crate::access_log::AccessLogMiddleware;
use crate::request_id::{placeholder_request_id, placeholder_transaction_id, RequestIdFn};
use crate::settings::AccessLogSettings;
use httplog_core::{is_reserved_field, HttplogError, HttplogResult, LogSink, TransactionIdFn};
use httplog_telemetry::TracingSink;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Default `version`.
pub const DEFAULT_VERSION: &str = "latest";

/// Default `environment`.
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Hostname used when the system hostname cannot be determined.
const FALLBACK_HOSTNAME: &str = "localhost";

/// Returns the system hostname.
///
/// Falls back to `localhost` when the name is empty or not valid UTF-8.
#[must_use]
pub fn system_hostname() -> String {
    gethostname::gethostname()
        .into_string()
        .ok()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}

/// Configuration for [`AccessLogMiddleware`].
///
/// | Field            | Default                       |
/// |------------------|-------------------------------|
/// | `service`        | system hostname               |
/// | `host`           | system hostname               |
/// | `version`        | `"latest"`                    |
/// | `environment`    | `"production"`                |
/// | `tags`           | none                          |
/// | `request_id`     | returns `"0"`                 |
/// | `transaction_id` | returns `"0"`                 |
/// | `redact`         | none                          |
/// | `sink`           | [`TracingSink`]               |
#[derive(Clone)]
pub struct AccessLogConfig {
    /// Service name.
    pub service: String,

    /// Host name.
    pub host: String,

    /// Service version.
    pub version: String,

    /// Deployment environment.
    pub environment: String,

    /// Static fields set on the per-request logger, in insertion order.
    pub tags: IndexMap<String, Value>,

    /// Derives the request id.
    pub request_id: RequestIdFn,

    /// Derives a transaction id for each application event.
    pub transaction_id: TransactionIdFn,

    /// Query parameter names whose values are redacted.
    pub redact: HashSet<String>,

    /// Where records are emitted.
    pub sink: Arc<dyn LogSink>,
}

impl AccessLogConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> AccessLogConfigBuilder {
        AccessLogConfigBuilder::new()
    }

    /// Creates a configuration from loaded settings, using defaults for
    /// anything the settings leave out.
    #[must_use]
    pub fn from_settings(settings: AccessLogSettings) -> Self {
        let mut config = Self::default();
        if let Some(service) = settings.service {
            config.service = service;
        }
        if let Some(host) = settings.host {
            config.host = host;
        }
        if let Some(version) = settings.version {
            config.version = version;
        }
        if let Some(environment) = settings.environment {
            config.environment = environment;
        }
        config.tags = settings.tags;
        config.redact = settings.redact.into_iter().collect();
        config
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HttplogError::InvalidConfig`] for an empty service, host,
    /// version or environment, an empty or reserved tag key (see
    /// [`httplog_core::RESERVED_FIELDS`]), or an empty redaction name.
    pub fn validate(&self) -> HttplogResult<()> {
        for (name, value) in [
            ("service", &self.service),
            ("host", &self.host),
            ("version", &self.version),
            ("environment", &self.environment),
        ] {
            if value.trim().is_empty() {
                return Err(HttplogError::invalid_config(format!(
                    "{name} must not be empty"
                )));
            }
        }
        if self.tags.keys().any(String::is_empty) {
            return Err(HttplogError::invalid_config("tag keys must not be empty"));
        }
        if let Some(key) = self.tags.keys().find(|key| is_reserved_field(key)) {
            return Err(HttplogError::invalid_config(format!(
                "tag key {key:?} is a reserved record field"
            )));
        }
        if self.redact.iter().any(String::is_empty) {
            return Err(HttplogError::invalid_config(
                "redacted parameter names must not be empty",
            ));
        }
        Ok(())
    }
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        let hostname = system_hostname();
        Self {
            service: hostname.clone(),
            host: hostname,
            version: DEFAULT_VERSION.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            tags: IndexMap::new(),
            request_id: placeholder_request_id(),
            transaction_id: placeholder_transaction_id(),
            redact: HashSet::new(),
            sink: Arc::new(TracingSink::new()),
        }
    }
}

impl fmt::Debug for AccessLogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessLogConfig")
            .field("service", &self.service)
            .field("host", &self.host)
            .field("version", &self.version)
            .field("environment", &self.environment)
            .field("tags", &self.tags)
            .field("redact", &self.redact)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AccessLogConfig`].
#[derive(Debug, Default)]
pub struct AccessLogConfigBuilder {
    config: AccessLogConfig,
}

impl AccessLogConfigBuilder {
    /// Creates a builder starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service name.
    #[must_use]
    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.config.service = service.into();
        self
    }

    /// Sets the host name.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the service version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = version.into();
        self
    }

    /// Sets the environment.
    #[must_use]
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.config.environment = environment.into();
        self
    }

    /// Adds a static tag. A repeated key replaces the earlier value in place.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.tags.insert(key.into(), value.into());
        self
    }

    /// Replaces all static tags.
    #[must_use]
    pub fn tags(mut self, tags: IndexMap<String, Value>) -> Self {
        self.config.tags = tags;
        self
    }

    /// Sets the request id source.
    #[must_use]
    pub fn request_id<F>(mut self, source: F) -> Self
    where
        F: Fn(&crate::types::Request) -> String + Send + Sync + 'static,
    {
        self.config.request_id = Arc::new(source);
        self
    }

    /// Sets an already shared request id source.
    #[must_use]
    pub fn request_id_fn(mut self, source: RequestIdFn) -> Self {
        self.config.request_id = source;
        self
    }

    /// Sets the transaction id source.
    #[must_use]
    pub fn transaction_id<F>(mut self, source: F) -> Self
    where
        F: Fn(&httplog_core::RequestContext) -> String + Send + Sync + 'static,
    {
        self.config.transaction_id = Arc::new(source);
        self
    }

    /// Sets an already shared transaction id source.
    #[must_use]
    pub fn transaction_id_fn(mut self, source: TransactionIdFn) -> Self {
        self.config.transaction_id = source;
        self
    }

    /// Adds query parameter names to redact.
    #[must_use]
    pub fn redact<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.redact.extend(names.into_iter().map(Into::into));
        self
    }

    /// Sets the sink records are emitted to.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.config.sink = sink;
        self
    }

    /// Returns the configuration without validating it.
    #[must_use]
    pub fn into_config(self) -> AccessLogConfig {
        self.config
    }

    /// Validates the configuration and builds the middleware.
    ///
    /// # Errors
    ///
    /// Returns [`HttplogError::InvalidConfig`] when validation fails.
    pub fn build(self) -> HttplogResult<AccessLogMiddleware> {
        AccessLogMiddleware::new(self.config)
    }
}
