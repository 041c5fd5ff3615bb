//! wsbridge: a WebSocket (RFC 6455) adapter for line-based text servers.
//!
//! # Overview
//!
//! A text server that reads newline-terminated commands can serve browser
//! clients by recognizing the upgrade request among its ordinary input
//! lines. From then on the connection carries frames: inbound frames are
//! decoded back into the plain byte stream the server already processes,
//! and server output is framed per channel (text, JSON, HTML, Pueblo,
//! prompt, binary) so the client can route each part.
//!
//! # Module Structure
//!
//! - [`websocket`]: Handshake negotiation, resumable frame decoding and
//!   outbound multiplexing
//! - [`session`]: Per-connection driver over raw socket bytes
//! - [`channel`]: Channel selectors
//! - [`markup`]: In-band channel markup producers
//! - [`escape`]: Escape codec for binary data inside markup
//! - [`codec`]: `Decoder`/`Encoder` traits and the line codec
//! - [`config`]: Adapter configuration
//! - [`error`]: Error types
//! - [`tracing_compat`]: Logging shim over `tracing`

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod escape;
pub mod markup;
pub mod session;
pub mod tracing_compat;
pub mod websocket;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenient access to core types
pub use channel::Channel;
pub use config::{ConfigError, WsConfig};
pub use error::{Error, ErrorCategory, ErrorKind, Result};
pub use session::{Received, WsSession};
pub use websocket::{
    compute_accept_key, to_websocket_frame, ConnectionState, DecodeProgress, DecodeState,
    FrameDecoder, Multiplexer, Negotiator, ProtocolMode, WsError,
};
