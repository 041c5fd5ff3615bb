//! Error types and error handling strategy for wsbridge.
//!
//! Each component reports failures through its own small enum
//! ([`WsError`], [`HandshakeError`], [`EscapeError`], [`MarkupError`],
//! [`ConfigError`], [`LinesCodecError`]). They all convert into the
//! crate-level [`Error`], which classifies them the way connection code
//! needs to react:
//!
//! - **Malformed**: bad input that the permissive policy would have
//!   absorbed; a strict policy surfaces it and the connection should close.
//! - **Capacity**: a bounded buffer was too small; nothing partial was
//!   written.
//! - **Handshake**: the upgrade could not proceed.
//! - **Config**: invalid configuration.
//!
//! No operation panics on bad input.

use core::fmt;
use std::sync::Arc;

use crate::codec::LinesCodecError;
use crate::config::ConfigError;
use crate::escape::EscapeError;
use crate::markup::MarkupError;
use crate::websocket::{HandshakeError, WsError};

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Malformed ===
    /// Frame violated the active protocol policy.
    Protocol,
    /// Escaped data ended in the middle of an escape sequence.
    TruncatedEscape,
    /// Channel data contained a tag terminator.
    NestedTag,

    // === Capacity ===
    /// Destination buffer too small.
    BufferFull,
    /// Input line longer than the configured maximum.
    LineTooLong,

    // === Handshake ===
    /// Handshake step attempted in the wrong connection mode.
    HandshakeState,
    /// Header block ended without a usable key.
    MissingKey,

    // === Config ===
    /// Configuration value rejected.
    InvalidConfig,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Protocol | Self::TruncatedEscape | Self::NestedTag => ErrorCategory::Malformed,
            Self::BufferFull | Self::LineTooLong => ErrorCategory::Capacity,
            Self::HandshakeState | Self::MissingKey => ErrorCategory::Handshake,
            Self::InvalidConfig => ErrorCategory::Config,
        }
    }

    /// Returns true if the connection should be closed after this error.
    #[must_use]
    pub const fn closes_connection(&self) -> bool {
        matches!(
            self,
            Self::Protocol | Self::LineTooLong | Self::HandshakeState | Self::MissingKey
        )
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Input that does not follow the wire or markup format.
    Malformed,
    /// Bounded buffer exhausted.
    Capacity,
    /// Upgrade negotiation failures.
    Handshake,
    /// Configuration failures.
    Config,
}

/// The main error type for wsbridge operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns true if the connection should be closed.
    #[must_use]
    pub const fn closes_connection(&self) -> bool {
        self.kind.closes_connection()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<WsError> for Error {
    fn from(err: WsError) -> Self {
        Self::new(ErrorKind::Protocol)
            .with_message(err.to_string())
            .with_source(err)
    }
}

impl From<HandshakeError> for Error {
    fn from(err: HandshakeError) -> Self {
        let kind = match err {
            HandshakeError::MissingKey => ErrorKind::MissingKey,
            HandshakeError::NotAwaitingUpgrade(_) | HandshakeError::UnknownRequestLine => {
                ErrorKind::HandshakeState
            }
        };
        Self::new(kind)
            .with_message(err.to_string())
            .with_source(err)
    }
}

impl From<EscapeError> for Error {
    fn from(err: EscapeError) -> Self {
        let kind = match err {
            EscapeError::BufferFull { .. } => ErrorKind::BufferFull,
            EscapeError::DanglingEscape { .. } => ErrorKind::TruncatedEscape,
        };
        Self::new(kind).with_message(err.to_string()).with_source(err)
    }
}

impl From<MarkupError> for Error {
    fn from(err: MarkupError) -> Self {
        let kind = match err {
            MarkupError::BufferFull { .. } => ErrorKind::BufferFull,
            MarkupError::NestedTag => ErrorKind::NestedTag,
        };
        Self::new(kind).with_message(err.to_string()).with_source(err)
    }
}

impl From<LinesCodecError> for Error {
    fn from(err: LinesCodecError) -> Self {
        Self::new(ErrorKind::LineTooLong)
            .with_message(err.to_string())
            .with_source(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::InvalidConfig).with_message(err.to_string())
    }
}

/// A specialized Result type for wsbridge operations.
pub type Result<T> = core::result::Result<T, Error>;
