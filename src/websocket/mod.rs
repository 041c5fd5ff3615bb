//! WebSocket protocol engine (RFC 6455) for a line-based server.
//!
//! # Architecture
//!
//! - `handshake`: recognizes the upgrade request among ordinary input
//!   lines and answers it with 101 or 426
//! - `decoder`: resumable decoder for masked client frames
//! - `mux`: frames server output, splitting marked-up output by channel
//! - `frame`: wire format primitives
//! - `state`: per-connection state, including the packed decoder state
//! - `policy`: permissive or strict validation
//!
//! # Example
//!
//! ```
//! use wsbridge::websocket::{ConnectionState, HandshakeStep, Negotiator};
//!
//! let negotiator = Negotiator::new();
//! let mut conn = ConnectionState::new();
//!
//! negotiator.begin(&mut conn, b"GET /wsclient HTTP/1.1").unwrap();
//! negotiator
//!     .consume_header_line(&mut conn, b"Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==")
//!     .unwrap();
//! let step = negotiator.consume_header_line(&mut conn, b"").unwrap();
//! assert!(matches!(step, HandshakeStep::Accepted { .. }));
//! assert!(conn.is_framed());
//! ```

mod decoder;
mod frame;
mod handshake;
mod mux;
mod policy;
mod state;

pub use decoder::{decode_chunk, DecodeProgress, FrameDecoder};
pub use frame::{apply_mask, header_len, put_header, Opcode, WsError, MAX_HEADER_LEN};
pub use handshake::{
    compute_accept_key, is_upgrade_request, upgrade_response, HandshakeError, HandshakeStep,
    Negotiator, DEFAULT_REQUEST_LINE, REJECT_RESPONSE,
};
pub use mux::{
    to_websocket_frame, FrameWriter, Multiplexer, Outbound, DEFAULT_OUTPUT_CAPACITY,
    DEFAULT_SCRATCH_CAPACITY,
};
pub use policy::{select as select_policy, FramePolicy, Permissive, SharedPolicy, Strict};
pub use state::{
    ConnectionState, DecodePhase, DecodeState, FirstByte, HandshakeKey, ProtocolMode,
    HANDSHAKE_KEY_LEN,
};
