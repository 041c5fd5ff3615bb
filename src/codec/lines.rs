//! Codec for newline-delimited input lines.
//!
//! Lines are kept as bytes: the upgrade request and its headers are ASCII,
//! but whatever else the client types is not ours to validate.

use crate::codec::Decoder;
use bytes::BytesMut;
use thiserror::Error;

/// Errors produced by `LinesCodec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinesCodecError {
    /// Input exceeded the configured maximum line length.
    #[error("line exceeds maximum length of {max} bytes")]
    MaxLineLengthExceeded {
        /// The configured limit.
        max: usize,
    },
}

/// Codec for newline-delimited lines, with the line terminator stripped.
#[derive(Debug, Clone)]
pub struct LinesCodec {
    max_length: usize,
    next_index: usize,
}

impl LinesCodec {
    /// Creates a new `LinesCodec` with no length limit.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_max_length(usize::MAX)
    }

    /// Creates a new `LinesCodec` with a maximum line length.
    #[must_use]
    pub fn new_with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
        }
    }

    /// Returns the maximum allowed line length.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for LinesCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LinesCodec {
    type Item = BytesMut;
    type Error = LinesCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, Self::Error> {
        let read_to = std::cmp::min(self.max_length.saturating_add(1), src.len());

        let newline_offset = src[self.next_index..read_to]
            .iter()
            .position(|b| *b == b'\n');

        if let Some(offset) = newline_offset {
            let newline_index = self.next_index + offset;
            self.next_index = 0;

            let mut line = src.split_to(newline_index + 1);
            line.truncate(line.len() - 1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            Ok(Some(line))
        } else {
            if src.len() > self.max_length {
                return Err(LinesCodecError::MaxLineLengthExceeded {
                    max: self.max_length,
                });
            }
            self.next_index = read_to;
            Ok(None)
        }
    }
}
