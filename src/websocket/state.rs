//! Per-connection protocol state.
//!
//! The connection object owned by the server embeds one
//! [`ConnectionState`]. Only the decoder state has to survive between
//! reads, and it packs into [`DecodeState::ENCODED_LEN`] bytes so idle
//! connections can park it anywhere.

use super::frame::{Opcode, WsError, FIN_BIT};
use std::fmt;

/// Length of a base64-encoded 16-byte `Sec-WebSocket-Key`.
pub const HANDSHAKE_KEY_LEN: usize = 24;

/// Protocol mode of a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProtocolMode {
    /// Line protocol; no upgrade request seen.
    #[default]
    Plain,
    /// Upgrade request line seen, consuming header lines.
    AwaitingUpgrade,
    /// 101 response sent; traffic is WebSocket frames.
    Framed,
    /// Header block ended without a usable key; 426 sent.
    Rejected,
}

impl fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plain => "plain",
            Self::AwaitingUpgrade => "awaiting-upgrade",
            Self::Framed => "framed",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Client key captured from `Sec-WebSocket-Key`, kept verbatim.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HandshakeKey([u8; HANDSHAKE_KEY_LEN]);

impl HandshakeKey {
    /// Captures `value` if it is exactly [`HANDSHAKE_KEY_LEN`] bytes.
    #[must_use]
    pub fn new(value: &[u8]) -> Option<Self> {
        <[u8; HANDSHAKE_KEY_LEN]>::try_from(value).ok().map(Self)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HANDSHAKE_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for HandshakeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandshakeKey")
            .field(&String::from_utf8_lossy(&self.0))
            .finish()
    }
}

/// Header phase of the frame decoder, in wire order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodePhase {
    /// Expecting the FIN/opcode byte.
    #[default]
    Opcode,
    /// Expecting the mask-bit/length byte.
    Length,
    /// Accumulating a big-endian extended length.
    ExtendedLength {
        /// Width of the length field in bytes (2 or 8).
        width: u8,
        /// Length bytes still to read (1..=width).
        remaining: u8,
    },
    /// Reading the mask key.
    MaskKey {
        /// Next mask byte to fill (0..=3).
        index: u8,
    },
    /// Consuming payload bytes.
    Payload,
}

/// What to do with the next payload byte of the current message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FirstByte {
    /// Emit payload bytes.
    Emit,
    /// The next payload byte is the channel selector.
    #[default]
    ExpectChannel,
    /// Discard payload bytes until the message ends.
    Ignore,
}

/// Resumable frame decoder state.
///
/// Every scalar that outlives one decode call lives here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeState {
    pub(crate) phase: DecodePhase,
    pub(crate) mask: [u8; 4],
    /// Header byte of the frame being decoded (FIN, RSV, raw opcode).
    pub(crate) frame: u8,
    /// Opcode of the data message in progress; continuations inherit it.
    pub(crate) message: u8,
    pub(crate) first: FirstByte,
    /// A data frame without FIN has been seen and not yet finished.
    pub(crate) in_message: bool,
    /// Payload bytes consumed in this frame, modulo 4.
    pub(crate) mask_index: u8,
    /// Payload (or, while reading the header, length) bytes remaining.
    pub(crate) remaining: u64,
}

impl Default for DecodeState {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeState {
    /// Size of the packed form produced by [`DecodeState::to_bytes`].
    pub const ENCODED_LEN: usize = 19;

    /// Creates a state awaiting the first frame header.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: DecodePhase::Opcode,
            mask: [0; 4],
            frame: 0,
            message: Opcode::Text as u8,
            first: FirstByte::ExpectChannel,
            in_message: false,
            mask_index: 0,
            remaining: 0,
        }
    }

    /// Returns the current header phase.
    #[must_use]
    pub const fn phase(&self) -> DecodePhase {
        self.phase
    }

    /// Returns true if the decoder is between frames.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.phase, DecodePhase::Opcode)
    }

    /// Returns the payload bytes remaining in the current frame.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    pub(crate) const fn frame_is_final(&self) -> bool {
        self.frame & FIN_BIT != 0
    }

    /// Packs the state into a fixed-size buffer.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let (tag, arg) = match self.phase {
            DecodePhase::Opcode => (0, 0),
            DecodePhase::Length => (1, 0),
            DecodePhase::ExtendedLength { width, remaining } => (2, (width << 4) | remaining),
            DecodePhase::MaskKey { index } => (3, index),
            DecodePhase::Payload => (4, 0),
        };
        let first = match self.first {
            FirstByte::Emit => 0,
            FirstByte::ExpectChannel => 1,
            FirstByte::Ignore => 2,
        };

        let mut out = [0u8; Self::ENCODED_LEN];
        out[0] = tag;
        out[1] = arg;
        out[2..6].copy_from_slice(&self.mask);
        out[6] = self.frame;
        out[7] = self.message;
        out[8] = first;
        out[9] = u8::from(self.in_message);
        out[10] = self.mask_index;
        out[11..19].copy_from_slice(&self.remaining.to_be_bytes());
        out
    }

    /// Restores a state packed by [`DecodeState::to_bytes`].
    pub fn from_bytes(bytes: &[u8; Self::ENCODED_LEN]) -> Result<Self, WsError> {
        let phase = match (bytes[0], bytes[1]) {
            (0, _) => DecodePhase::Opcode,
            (1, _) => DecodePhase::Length,
            (2, arg) => {
                let (width, remaining) = (arg >> 4, arg & 0x0F);
                if !matches!(width, 2 | 8) || remaining == 0 || remaining > width {
                    return Err(WsError::InvalidState("extended length"));
                }
                DecodePhase::ExtendedLength { width, remaining }
            }
            (3, index @ 0..=3) => DecodePhase::MaskKey { index },
            (4, _) => DecodePhase::Payload,
            _ => return Err(WsError::InvalidState("phase")),
        };
        let first = match bytes[8] {
            0 => FirstByte::Emit,
            1 => FirstByte::ExpectChannel,
            2 => FirstByte::Ignore,
            _ => return Err(WsError::InvalidState("first-byte flag")),
        };
        if bytes[10] > 3 {
            return Err(WsError::InvalidState("mask index"));
        }

        let mut mask = [0u8; 4];
        mask.copy_from_slice(&bytes[2..6]);
        let mut remaining = [0u8; 8];
        remaining.copy_from_slice(&bytes[11..19]);

        Ok(Self {
            phase,
            mask,
            frame: bytes[6],
            message: bytes[7],
            first,
            in_message: bytes[9] != 0,
            mask_index: bytes[10],
            remaining: u64::from_be_bytes(remaining),
        })
    }
}

/// Protocol state the server's connection object carries for this adapter.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    mode: ProtocolMode,
    handshake_key: Option<HandshakeKey>,
    decode_state: DecodeState,
}

impl ConnectionState {
    /// Creates the state of a fresh line-protocol connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the protocol mode.
    #[must_use]
    pub const fn mode(&self) -> ProtocolMode {
        self.mode
    }

    /// Returns true once the connection exchanges frames.
    #[must_use]
    pub const fn is_framed(&self) -> bool {
        matches!(self.mode, ProtocolMode::Framed)
    }

    /// Returns the captured client key while awaiting the upgrade.
    #[must_use]
    pub const fn handshake_key(&self) -> Option<&HandshakeKey> {
        self.handshake_key.as_ref()
    }

    /// Returns the decoder state. Meaningful only in framed mode.
    #[must_use]
    pub const fn decode_state(&self) -> &DecodeState {
        &self.decode_state
    }

    /// Mutable access to the decoder state.
    pub fn decode_state_mut(&mut self) -> &mut DecodeState {
        &mut self.decode_state
    }

    pub(crate) fn begin_upgrade(&mut self) {
        self.mode = ProtocolMode::AwaitingUpgrade;
        self.handshake_key = None;
    }

    pub(crate) fn set_handshake_key(&mut self, key: HandshakeKey) {
        self.handshake_key = Some(key);
    }

    pub(crate) fn complete_upgrade(&mut self) {
        self.mode = ProtocolMode::Framed;
        self.handshake_key = None;
        self.decode_state = DecodeState::new();
    }

    pub(crate) fn reject_upgrade(&mut self) {
        self.mode = ProtocolMode::Rejected;
        self.handshake_key = None;
    }
}
