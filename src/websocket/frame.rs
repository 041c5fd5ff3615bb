//! WebSocket wire format primitives (RFC 6455 Section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```
//!
//! Frames are never materialized as a whole here: the decoder walks them a
//! byte at a time and the multiplexer writes header and payload straight
//! into its output buffer.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// FIN bit of the first header byte.
pub const FIN_BIT: u8 = 0x80;
/// RSV1..RSV3 bits of the first header byte.
pub const RSV_BITS: u8 = 0x70;
/// MASK bit of the second header byte.
pub const MASK_BIT: u8 = 0x80;
/// 7-bit length value announcing a 16-bit extended length.
pub const LEN_16: u8 = 126;
/// 7-bit length value announcing a 64-bit extended length.
pub const LEN_64: u8 = 127;
/// Largest payload length encoded directly in the 7-bit field.
pub const MAX_INLINE_LEN: usize = 125;
/// Worst-case header written by the multiplexer: opcode byte, up to nine
/// length bytes and the channel selector.
pub const MAX_HEADER_LEN: usize = 1 + 9 + 1;

/// WebSocket frame opcode (4 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Continuation frame (fragmented message).
    Continuation = 0x0,
    /// Text data frame.
    Text = 0x1,
    /// Binary data frame.
    Binary = 0x2,
    // 0x3-0x7 reserved for non-control frames
    /// Connection close control frame.
    Close = 0x8,
    /// Ping control frame.
    Ping = 0x9,
    /// Pong control frame.
    Pong = 0xA,
    // 0xB-0xF reserved for control frames
}

impl Opcode {
    /// Returns true if this is a control frame (Close, Ping, Pong).
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }

    /// Try to parse an opcode from the low four bits of a byte.
    pub fn from_u8(value: u8) -> Result<Self, WsError> {
        match value & 0x0F {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            other => Err(WsError::InvalidOpcode(other)),
        }
    }
}

/// Frame-level protocol errors.
///
/// The default permissive policy never raises these; they are the
/// `ProtocolError` outcome of a strict policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WsError {
    /// Reserved opcode value.
    #[error("invalid opcode: 0x{0:X}")]
    InvalidOpcode(u8),
    /// Reserved bits set without extension support.
    #[error("reserved bits set without extension")]
    ReservedBitsSet,
    /// Client frame is not masked.
    #[error("client frame must be masked")]
    UnmaskedClientFrame,
    /// Extended length used where a shorter encoding fits.
    #[error("non-minimal length encoding for {0} bytes")]
    NonMinimalLength(u64),
    /// 64-bit length with the most significant bit set.
    #[error("64-bit payload length has its most significant bit set")]
    LengthMsbSet,
    /// Continuation frame with no message in progress.
    #[error("continuation frame without a message in progress")]
    UnexpectedContinuation,
    /// Control frame longer than 125 bytes or fragmented.
    #[error("invalid control frame")]
    InvalidControlFrame,
    /// Persisted decoder state could not be restored.
    #[error("invalid decoder state: {0}")]
    InvalidState(&'static str),
}

/// Returns the header size for a payload of `payload_len` bytes
/// (unmasked, so no mask key).
#[must_use]
pub const fn header_len(payload_len: usize) -> usize {
    if payload_len <= MAX_INLINE_LEN {
        2
    } else if payload_len <= 0xFFFF {
        4
    } else {
        10
    }
}

/// Writes an unmasked, final frame header using the smallest length
/// encoding that fits.
pub fn put_header(dst: &mut BytesMut, opcode: Opcode, payload_len: usize) {
    dst.put_u8(FIN_BIT | opcode as u8);
    if payload_len <= MAX_INLINE_LEN {
        dst.put_u8(payload_len as u8);
    } else if let Ok(len) = u16::try_from(payload_len) {
        dst.put_u8(LEN_16);
        dst.put_u16(len);
    } else {
        dst.put_u8(LEN_64);
        dst.put_u64(payload_len as u64);
    }
}

/// Apply XOR masking to payload data.
///
/// `offset` is the position of `payload[0]` within the frame payload, so a
/// payload split across reads can be unmasked piecewise.
pub fn apply_mask(payload: &mut [u8], mask_key: [u8; 4], offset: u64) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask_key[((offset + i as u64) % 4) as usize];
    }
}
