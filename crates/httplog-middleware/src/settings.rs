//! Loading access log settings from files and the environment.
//!
//! Only the serializable part of [`AccessLogConfig`] can be loaded this way;
//! id sources and sinks are set in code.
//!
//! ```toml
//! service = "orders"
//! version = "2.1.0"
//! environment = "staging"
//! redact = ["token", "password"]
//!
//! [tags]
//! team = "fulfilment"
//! ```
//!
//! Environment variables override file values:
//!
//! | Variable            | Field         |
//! |---------------------|---------------|
//! | `<PREFIX>_SERVICE`  | `service`     |
//! | `<PREFIX>_HOST`     | `host`        |
//! | `<PREFIX>_VERSION`  | `version`     |
//! | `<PREFIX>_ENV`      | `environment` |
//! | `<PREFIX>_REDACT`   | `redact`, comma separated, added to the file's list |
//!
//! [`AccessLogConfig`]: crate::AccessLogConfig

use httplog_core::{HttplogError, HttplogResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Serializable access log settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessLogSettings {
    /// Service name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Host name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Service version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Deployment environment.
    #[serde(default, alias = "env", skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Query parameter names to redact.
    #[serde(default)]
    pub redact: Vec<String>,

    /// Static tags.
    #[serde(default)]
    pub tags: IndexMap<String, Value>,
}

impl AccessLogSettings {
    /// Parses settings from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`HttplogError::InvalidConfig`] on malformed TOML or an
    /// unknown field.
    pub fn from_toml_str(content: &str) -> HttplogResult<Self> {
        toml::from_str(content).map_err(|e| HttplogError::invalid_config(e.to_string()))
    }

    /// Reads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`HttplogError::Io`] if the file cannot be read, or
    /// [`HttplogError::InvalidConfig`] if it does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> HttplogResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Applies overrides from process environment variables starting with
    /// `prefix`.
    #[must_use]
    pub fn with_env(self, prefix: &str) -> Self {
        self.with_vars(prefix, std::env::vars())
    }

    /// Applies overrides from `vars`, read as environment variables.
    ///
    /// Variables without the prefix or with an unrecognized suffix are
    /// ignored.
    #[must_use]
    pub fn with_vars<I, K, V>(mut self, prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let prefix = prefix.to_uppercase();
        for (key, value) in vars {
            let Some(field) = key
                .as_ref()
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('_'))
            else {
                continue;
            };

            let value = value.into();
            match field {
                "SERVICE" => self.service = Some(value),
                "HOST" => self.host = Some(value),
                "VERSION" => self.version = Some(value),
                "ENV" => self.environment = Some(value),
                "REDACT" => self.redact.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(ToString::to_string),
                ),
                other => {
                    tracing::debug!(variable = %key.as_ref(), field = other, "ignoring unknown setting");
                }
            }
        }
        self
    }
}
