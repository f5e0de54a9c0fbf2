//! Shared configuration for the hostlink gateway.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then an
//! optional configuration file, then `HOSTLINK_*` environment variables, then
//! command-line flags. The resulting [`Config`] carries everything the gateway
//! reads at runtime: where to bind, how long to wait on idle peers, which
//! origins are trusted, the shared secret, and the protocol versions spoken.

mod defaults;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_API_VERSION, DEFAULT_BACKLOG, DEFAULT_BIND_ADDRESS, DEFAULT_BIND_PORT,
    DEFAULT_LOG_FILTER, DEFAULT_MAX_REQUEST_BYTES, DEFAULT_READ_TIMEOUT_MS,
    DEFAULT_REQUEST_VERSION, DEFAULT_TICK_INTERVAL_MS, LOCALHOST_ORIGIN, default_api_version,
    default_backlog, default_bind_address, default_bind_port, default_cors_origin_list,
    default_log_filter, default_log_filter_string, default_log_format, default_max_request_bytes,
    default_read_timeout_ms, default_request_version, default_tick_interval_ms,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "HOSTLINK")]
pub struct Config {
    /// Host name or address the listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port the listener binds to. Zero selects an ephemeral port.
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
    /// Accept backlog handed to the operating system.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Period of the host tick driving the gateway, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Idle-read timeout per connection, in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Largest request frame the gateway buffers before dropping the peer.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
    /// Shared secret callers must present in the `key` field.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Current protocol version reported by `version` and the banner.
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    /// Version assumed when a request does not declare one.
    #[serde(default = "default_request_version")]
    pub default_version: u32,
    /// Origins trusted by the CORS policy.
    #[serde(default = "default_cors_origin_list")]
    pub cors_origin_list: Vec<String>,
    /// Deprecated single trusted origin, appended to `cors_origin_list`.
    #[serde(default)]
    pub cors_origin: Option<String>,
    /// Origins whose permission requests are denied without prompting.
    #[serde(default)]
    pub ignore_origin_list: Vec<String>,
    /// File used to persist interactive permission decisions.
    #[serde(default)]
    pub permission_store_path: Option<Utf8PathBuf>,
    /// `tracing` filter expression.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            backlog: default_backlog(),
            tick_interval_ms: default_tick_interval_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            max_request_bytes: default_max_request_bytes(),
            api_key: None,
            api_version: default_api_version(),
            default_version: default_request_version(),
            cors_origin_list: default_cors_origin_list(),
            cors_origin: None,
            ignore_origin_list: Vec::new(),
            permission_store_path: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads the configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns the loader error when a layer cannot be read or merged.
    pub fn load_validated() -> Result<Self, ConfigLoadError> {
        let config = Self::load().map_err(ConfigLoadError::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints the individual layers cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigLoadError::invalid("bind_address must not be empty"));
        }
        if self.backlog == 0 {
            return Err(ConfigLoadError::invalid("backlog must be at least 1"));
        }
        if self.default_version > self.api_version {
            return Err(ConfigLoadError::invalid(format!(
                "default_version {} exceeds api_version {}",
                self.default_version, self.api_version
            )));
        }
        Ok(())
    }

    /// Returns the effective CORS allow-list, including the deprecated
    /// single-origin setting when present.
    #[must_use]
    pub fn cors_allow_list(&self) -> Vec<String> {
        let mut list = self.cors_origin_list.clone();
        if let Some(origin) = self.cors_origin.as_deref().map(str::trim)
            && !origin.is_empty()
            && !list.iter().any(|entry| entry == origin)
        {
            list.push(origin.to_owned());
        }
        list
    }

    /// Returns the configured shared secret, treating blank values as unset.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty())
    }

    /// Accessor for the bind host.
    #[must_use]
    pub fn bind_address(&self) -> &str {
        self.bind_address.as_str()
    }

    /// Accessor for the bind port.
    #[must_use]
    pub const fn bind_port(&self) -> u16 {
        self.bind_port
    }

    /// Host tick period.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Idle-read timeout applied to each connection.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Accessor for the log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Accessor for the log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Errors surfaced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// A configuration layer failed to load.
    #[error("failed to load configuration: {0}")]
    Load(#[source] Arc<OrthoError>),
    /// The merged configuration violates a constraint.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Description of the violated constraint.
        message: String,
    },
}

impl ConfigLoadError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}
