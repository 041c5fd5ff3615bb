//! Configuration for the WebSocket adapter.
//!
//! All settings have defaults matching the stock server build:
//!
//! ```toml
//! request_line = "GET /wsclient HTTP/1.1"
//! output_capacity = 32768
//! scratch_capacity = 8192
//! max_header_line = 8192
//! strict = false
//! ```
//!
//! Loading from TOML requires the `config-file` feature. Missing keys take
//! their default.

use crate::websocket::{
    select_policy, Multiplexer, Negotiator, SharedPolicy, DEFAULT_OUTPUT_CAPACITY,
    DEFAULT_REQUEST_LINE, DEFAULT_SCRATCH_CAPACITY, MAX_HEADER_LEN,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default bound on one handshake header line, in bytes.
pub const DEFAULT_MAX_HEADER_LINE: usize = 8 * 1024;

/// Errors from building or loading a [`WsConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field failed validation.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config text is not valid TOML for this struct.
    #[error("failed to parse TOML config: {0}")]
    Parse(String),
}

/// Adapter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WsConfig {
    /// Request line that starts the upgrade.
    pub request_line: String,
    /// Capacity of the outbound frame buffer for one write.
    pub output_capacity: usize,
    /// Capacity for unescaping one binary segment.
    pub scratch_capacity: usize,
    /// Longest handshake header line accepted before the connection is
    /// dropped. Plain-mode lines are not bounded.
    pub max_header_line: usize,
    /// Use RFC 6455 conformance checks instead of best-effort decoding.
    pub strict: bool,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            request_line: DEFAULT_REQUEST_LINE.to_string(),
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
            max_header_line: DEFAULT_MAX_HEADER_LINE,
            strict: false,
        }
    }
}

impl WsConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the upgrade request line.
    #[must_use]
    pub fn request_line(mut self, line: impl Into<String>) -> Self {
        self.request_line = line.into();
        self
    }

    /// Sets the outbound buffer capacity.
    #[must_use]
    pub fn output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity;
        self
    }

    /// Sets the binary scratch capacity.
    #[must_use]
    pub fn scratch_capacity(mut self, capacity: usize) -> Self {
        self.scratch_capacity = capacity;
        self
    }

    /// Sets the maximum handshake line length.
    #[must_use]
    pub fn max_header_line(mut self, len: usize) -> Self {
        self.max_header_line = len;
        self
    }

    /// Selects the strict policy.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Checks field values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_line.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "request_line",
                reason: "must not be empty".into(),
            });
        }
        if self.output_capacity < MAX_HEADER_LEN {
            return Err(ConfigError::Invalid {
                field: "output_capacity",
                reason: format!(
                    "{} is below the {MAX_HEADER_LEN}-byte frame header reserve",
                    self.output_capacity
                ),
            });
        }
        if self.max_header_line == 0 {
            return Err(ConfigError::Invalid {
                field: "max_header_line",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    /// Returns the frame policy this configuration selects.
    #[must_use]
    pub fn policy(&self) -> SharedPolicy {
        select_policy(self.strict)
    }

    /// Builds a negotiator for this configuration.
    #[must_use]
    pub fn negotiator(&self) -> Negotiator {
        Negotiator::new()
            .request_line(self.request_line.clone())
            .policy(self.policy())
    }

    /// Builds a multiplexer for this configuration.
    #[must_use]
    pub const fn multiplexer(&self) -> Multiplexer {
        Multiplexer::new()
            .output_capacity(self.output_capacity)
            .scratch_capacity(self.scratch_capacity)
    }

    /// Parses and validates a TOML document.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}
