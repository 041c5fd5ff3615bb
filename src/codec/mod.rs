//! Codec traits and the line codec that feeds the handshake.
//!
//! A [`Decoder`] turns buffered bytes into items and an [`Encoder`] turns
//! items back into bytes. The frame decoder and the multiplexer in
//! [`crate::websocket`] implement them, and [`LinesCodec`] splits the
//! plain-mode input into lines for upgrade detection.

pub mod lines;

pub use lines::{LinesCodec, LinesCodecError};

use bytes::BytesMut;

/// Decodes items from a byte buffer.
pub trait Decoder {
    /// The decoded item type.
    type Item;
    /// The error type.
    type Error;

    /// Attempts to decode one item from `src`.
    ///
    /// Returns `Ok(None)` when more input is needed. Consumed bytes are
    /// removed from `src`.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error>;
}

/// Encodes items into a byte buffer.
pub trait Encoder<Item> {
    /// The error type.
    type Error;

    /// Appends the encoding of `item` to `dst`.
    fn encode(&mut self, item: Item, dst: &mut BytesMut) -> Result<(), Self::Error>;
}
