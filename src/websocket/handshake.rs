//! WebSocket upgrade negotiation (RFC 6455 Section 4).
//!
//! The server's line reader hands the negotiator one line at a time. The
//! only request accepted is the fixed resource path:
//!
//! ```http
//! GET /wsclient HTTP/1.1
//! Host: server.example.com
//! Upgrade: websocket
//! Connection: Upgrade
//! Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==
//! Sec-WebSocket-Version: 13
//! ```
//!
//! Only `Sec-WebSocket-Key` is read; every other header is ignored. The
//! empty line ends the block and produces either the 101 response or a
//! 426 rejection.

use super::policy::{Permissive, SharedPolicy};
use super::state::{ConnectionState, HandshakeKey, ProtocolMode};
use crate::tracing_compat::{debug, info, warn};
use base64::Engine;
use sha1::{Digest, Sha1};
use std::sync::Arc;
use thiserror::Error;

/// RFC 6455 GUID for Sec-WebSocket-Accept calculation.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The upgrade request line served by default.
pub const DEFAULT_REQUEST_LINE: &str = "GET /wsclient HTTP/1.1";

const KEY_HEADER: &[u8] = b"Sec-WebSocket-Key:";

/// Status line and fixed headers of the upgrade response; the accept token
/// and the closing blank line follow.
pub const UPGRADE_RESPONSE_PREFIX: &str = "HTTP/1.1 101 Switching Protocols\r\n\
                                           Upgrade: websocket\r\n\
                                           Connection: Upgrade\r\n\
                                           Sec-WebSocket-Accept: ";

/// Response sent when the header block carries no usable key.
pub const REJECT_RESPONSE: &[u8] = b"HTTP/1.1 426 Upgrade Required\r\n\
                                     Sec-WebSocket-Version: 13\r\n\
                                     \r\n";

/// Length of the base64-encoded SHA-1 accept token.
pub const ACCEPT_KEY_LEN: usize = 28;

/// Compute the Sec-WebSocket-Accept value from a client key.
///
/// Per RFC 6455 Section 4.2.2:
/// 1. Concatenate the client's Sec-WebSocket-Key with the GUID
/// 2. Take the SHA-1 hash
/// 3. Base64 encode the result
///
/// # Example
///
/// ```
/// use wsbridge::websocket::compute_accept_key;
///
/// let accept = compute_accept_key("dGhlIHNhbXBsZSBub25jZQ==");
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
#[must_use]
pub fn compute_accept_key(client_key: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_ref());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    base64::engine::general_purpose::STANDARD.encode(hash)
}

/// Builds the complete 101 response for `accept_key`.
#[must_use]
pub fn upgrade_response(accept_key: &str) -> Vec<u8> {
    let mut response =
        String::with_capacity(UPGRADE_RESPONSE_PREFIX.len() + accept_key.len() + 4);
    response.push_str(UPGRADE_RESPONSE_PREFIX);
    response.push_str(accept_key);
    response.push_str("\r\n\r\n");
    response.into_bytes()
}

/// Returns true if `line` is the default upgrade request line.
#[must_use]
pub fn is_upgrade_request(line: &[u8]) -> bool {
    Negotiator::new().recognizes(line)
}

/// Handshake errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// Header lines arrived while the connection was not negotiating.
    #[error("connection is {0}, not awaiting an upgrade")]
    NotAwaitingUpgrade(ProtocolMode),
    /// The request line is not the supported upgrade request.
    #[error("not a WebSocket upgrade request")]
    UnknownRequestLine,
    /// Header block ended without a usable Sec-WebSocket-Key.
    #[error("missing or malformed Sec-WebSocket-Key")]
    MissingKey,
}

/// Outcome of feeding one header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeStep {
    /// More header lines are expected.
    Continue,
    /// Upgrade complete; queue `response` before reading frames.
    Accepted {
        /// The 101 response bytes.
        response: Vec<u8>,
    },
    /// No key was offered; queue `response`. The connection cannot use
    /// WebSocket framing.
    Rejected {
        /// The 426 response bytes.
        response: &'static [u8],
    },
}

/// Server-side upgrade negotiator.
#[derive(Debug, Clone)]
pub struct Negotiator {
    request_line: String,
    policy: SharedPolicy,
}

impl Default for Negotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl Negotiator {
    /// Creates a negotiator for [`DEFAULT_REQUEST_LINE`] with the
    /// permissive policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_line: DEFAULT_REQUEST_LINE.to_string(),
            policy: Arc::new(Permissive),
        }
    }

    /// Sets the upgrade request line.
    #[must_use]
    pub fn request_line(mut self, line: impl Into<String>) -> Self {
        self.request_line = line.into();
        self
    }

    /// Sets the validation policy.
    #[must_use]
    pub fn policy(mut self, policy: SharedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns true if `line` requests the WebSocket upgrade.
    #[must_use]
    pub fn recognizes(&self, line: &[u8]) -> bool {
        self.policy
            .accepts_request_line(line, self.request_line.as_bytes())
    }

    /// Starts negotiating if `line` is the upgrade request line.
    pub fn begin(&self, conn: &mut ConnectionState, line: &[u8]) -> Result<(), HandshakeError> {
        if conn.mode() != ProtocolMode::Plain {
            return Err(HandshakeError::NotAwaitingUpgrade(conn.mode()));
        }
        if !self.recognizes(line) {
            return Err(HandshakeError::UnknownRequestLine);
        }
        conn.begin_upgrade();
        debug!("websocket upgrade requested");
        Ok(())
    }

    /// Consumes one header line, including the terminating empty line.
    ///
    /// A trailing CR is ignored. On the empty line the connection switches
    /// to framed mode (101) or is rejected (426).
    pub fn consume_header_line(
        &self,
        conn: &mut ConnectionState,
        line: &[u8],
    ) -> Result<HandshakeStep, HandshakeError> {
        if conn.mode() != ProtocolMode::AwaitingUpgrade {
            return Err(HandshakeError::NotAwaitingUpgrade(conn.mode()));
        }

        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return Ok(Self::finish(conn));
        }

        if line.len() >= KEY_HEADER.len()
            && line[..KEY_HEADER.len()].eq_ignore_ascii_case(KEY_HEADER)
        {
            let value = line[KEY_HEADER.len()..].trim_ascii();
            match HandshakeKey::new(value) {
                Some(key) => conn.set_handshake_key(key),
                None => {
                    debug!(len = value.len(), "ignoring malformed Sec-WebSocket-Key");
                }
            }
        }
        Ok(HandshakeStep::Continue)
    }

    fn finish(conn: &mut ConnectionState) -> HandshakeStep {
        let Some(key) = conn.handshake_key().copied() else {
            warn!("websocket handshake without a valid key, sending 426");
            conn.reject_upgrade();
            return HandshakeStep::Rejected {
                response: REJECT_RESPONSE,
            };
        };

        let accept = compute_accept_key(key.as_bytes());
        debug_assert_eq!(accept.len(), ACCEPT_KEY_LEN);
        let response = upgrade_response(&accept);
        conn.complete_upgrade();
        info!(accept = %accept, "switching to websocket mode");
        HandshakeStep::Accepted { response }
    }
}
