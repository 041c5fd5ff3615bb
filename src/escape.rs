//! Reversible byte escaping for binary payloads carried in markup.
//!
//! The output pipeline reserves NUL (string terminator) and [`TAG_END`]
//! (markup close) and cannot carry them literally. Binary data headed for
//! the BINARY channel is escaped with [`ESCAPE`] followed by a one-byte code:
//!
//! | Raw byte  | Escaped            |
//! |-----------|--------------------|
//! | `0x00`    | `0xFF 'n'`         |
//! | `TAG_END` | `0xFF 't'`         |
//! | `0xFF`    | `0xFF 0xFF`        |
//!
//! Both directions write into a caller-supplied slice and stop at the first
//! byte that does not fit, reporting how much was written.

use crate::markup::TAG_END;
use thiserror::Error;

/// Escape introducer byte.
pub const ESCAPE: u8 = 0xFF;
/// Escape code standing for NUL.
pub const ESCAPE_NUL: u8 = b'n';
/// Escape code standing for [`TAG_END`].
pub const ESCAPE_TAG_END: u8 = b't';

/// Escape codec errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EscapeError {
    /// Destination exhausted before the source was consumed.
    #[error("escape buffer full after {written} bytes")]
    BufferFull {
        /// Bytes written before stopping.
        written: usize,
    },
    /// Source ended on an escape introducer with no code byte.
    #[error("dangling escape introducer after {written} decoded bytes")]
    DanglingEscape {
        /// Bytes written before the dangling introducer.
        written: usize,
    },
}

impl EscapeError {
    /// Returns the number of bytes written before the failure.
    #[must_use]
    pub const fn written(&self) -> usize {
        match self {
            Self::BufferFull { written } | Self::DanglingEscape { written } => *written,
        }
    }
}

const fn escape_code(byte: u8) -> Option<u8> {
    match byte {
        0 => Some(ESCAPE_NUL),
        TAG_END => Some(ESCAPE_TAG_END),
        ESCAPE => Some(ESCAPE),
        _ => None,
    }
}

const fn unescape_code(code: u8) -> u8 {
    match code {
        ESCAPE_NUL => 0,
        ESCAPE_TAG_END => TAG_END,
        // ESCAPE maps to itself, unknown codes pass through.
        other => other,
    }
}

/// Returns the escaped length of `src`.
#[must_use]
pub fn encoded_len(src: &[u8]) -> usize {
    src.iter()
        .map(|&b| if escape_code(b).is_some() { 2 } else { 1 })
        .sum()
}

/// Escapes `src` into `dst`, returning the number of bytes written.
///
/// An escape pair is written whole or not at all.
pub fn encode_into(src: &[u8], dst: &mut [u8]) -> Result<usize, EscapeError> {
    let mut written = 0;
    for &byte in src {
        if let Some(code) = escape_code(byte) {
            if dst.len() - written < 2 {
                return Err(EscapeError::BufferFull { written });
            }
            dst[written] = ESCAPE;
            dst[written + 1] = code;
            written += 2;
        } else {
            if written == dst.len() {
                return Err(EscapeError::BufferFull { written });
            }
            dst[written] = byte;
            written += 1;
        }
    }
    Ok(written)
}

/// Reverses [`encode_into`], returning the number of bytes written.
pub fn decode_into(src: &[u8], dst: &mut [u8]) -> Result<usize, EscapeError> {
    let mut written = 0;
    let mut escaped = false;
    for &byte in src {
        let out = if escaped {
            escaped = false;
            unescape_code(byte)
        } else if byte == ESCAPE {
            escaped = true;
            continue;
        } else {
            byte
        };

        if written == dst.len() {
            return Err(EscapeError::BufferFull { written });
        }
        dst[written] = out;
        written += 1;
    }

    if escaped {
        return Err(EscapeError::DanglingEscape { written });
    }
    Ok(written)
}

/// Escapes `src` into a new vector.
#[must_use]
pub fn encode(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(src));
    for &byte in src {
        match escape_code(byte) {
            Some(code) => out.extend_from_slice(&[ESCAPE, code]),
            None => out.push(byte),
        }
    }
    out
}

/// Unescapes `src` into a new vector.
pub fn decode(src: &[u8]) -> Result<Vec<u8>, EscapeError> {
    let mut out = vec![0u8; src.len()];
    let written = decode_into(src, &mut out)?;
    out.truncate(written);
    Ok(out)
}
