//! Validation policy for the handshake and frame decoder.
//!
//! Every accept-or-reject decision the protocol engine makes goes through
//! [`FramePolicy`]. [`Permissive`] is the default and accepts whatever the
//! phase machine can walk; [`Strict`] rejects RFC 6455 violations with a
//! [`WsError`] that the caller treats as fatal for the connection.

use super::frame::{Opcode, WsError, FIN_BIT, LEN_16, MASK_BIT, MAX_INLINE_LEN, RSV_BITS};
use std::fmt::Debug;
use std::sync::Arc;

/// Decisions the protocol engine delegates to policy.
pub trait FramePolicy: Debug + Send + Sync {
    /// Returns true if `line` is the upgrade request line `expected`.
    fn accepts_request_line(&self, line: &[u8], expected: &[u8]) -> bool;

    /// Checks the FIN/opcode byte. `in_message` is true while a fragmented
    /// data message is open.
    fn check_frame_start(&self, header: u8, in_message: bool) -> Result<(), WsError>;

    /// Checks the mask-bit/length byte against its frame header.
    fn check_length_byte(&self, header: u8, length: u8) -> Result<(), WsError>;

    /// Checks a fully accumulated extended length and returns the payload
    /// length to read. `width` is 2 or 8.
    fn extended_length(&self, len: u64, width: u8) -> Result<u64, WsError>;
}

/// Shared handle to a policy.
pub type SharedPolicy = Arc<dyn FramePolicy>;

/// Best-effort policy: never rejects a frame.
///
/// The request line only has to start with the expected line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Permissive;

impl FramePolicy for Permissive {
    fn accepts_request_line(&self, line: &[u8], expected: &[u8]) -> bool {
        line.starts_with(expected)
    }

    fn check_frame_start(&self, _header: u8, _in_message: bool) -> Result<(), WsError> {
        Ok(())
    }

    fn check_length_byte(&self, _header: u8, _length: u8) -> Result<(), WsError> {
        Ok(())
    }

    fn extended_length(&self, len: u64, width: u8) -> Result<u64, WsError> {
        // The reserved most significant bit is dropped.
        if width == 8 {
            Ok(len & (u64::MAX >> 1))
        } else {
            Ok(len)
        }
    }
}

/// RFC 6455 conformance checks for client frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct Strict;

impl FramePolicy for Strict {
    fn accepts_request_line(&self, line: &[u8], expected: &[u8]) -> bool {
        line == expected
    }

    fn check_frame_start(&self, header: u8, in_message: bool) -> Result<(), WsError> {
        if header & RSV_BITS != 0 {
            return Err(WsError::ReservedBitsSet);
        }
        match Opcode::from_u8(header)? {
            Opcode::Continuation if !in_message => Err(WsError::UnexpectedContinuation),
            Opcode::Close | Opcode::Ping | Opcode::Pong if header & FIN_BIT == 0 => {
                Err(WsError::InvalidControlFrame)
            }
            _ => Ok(()),
        }
    }

    fn check_length_byte(&self, header: u8, length: u8) -> Result<(), WsError> {
        if length & MASK_BIT == 0 {
            return Err(WsError::UnmaskedClientFrame);
        }
        let is_control = Opcode::from_u8(header).is_ok_and(Opcode::is_control);
        if is_control && usize::from(length & !MASK_BIT) > MAX_INLINE_LEN {
            return Err(WsError::InvalidControlFrame);
        }
        Ok(())
    }

    fn extended_length(&self, len: u64, width: u8) -> Result<u64, WsError> {
        if width == 8 && len >> 63 != 0 {
            return Err(WsError::LengthMsbSet);
        }
        let minimum = if width == 2 {
            u64::from(LEN_16)
        } else {
            0x1_0000
        };
        if len < minimum {
            return Err(WsError::NonMinimalLength(len));
        }
        Ok(len)
    }
}

/// Returns the policy selected by a `strict` configuration flag.
#[must_use]
pub fn select(strict: bool) -> SharedPolicy {
    if strict {
        Arc::new(Strict)
    } else {
        Arc::new(Permissive)
    }
}
