//! Inline markup understood by the multiplexer, and the producer side that
//! writes it.
//!
//! A tag is `TAG_START <code> <payload> TAG_END`. The multiplexer only
//! interprets the codes defined here; everything else in the markup
//! language is dropped when framing for WebSocket clients.
//!
//! Producers append tags to a bounded buffer. On overflow the buffer is
//! left exactly as it was.

use crate::channel::Channel;
use crate::escape;
use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// Opens a markup tag.
pub const TAG_START: u8 = 0x02;
/// Closes a markup tag.
pub const TAG_END: u8 = 0x03;

/// Pueblo/HTML markup; framed on [`Channel::Pueblo`].
pub const MARKUP_HTML: u8 = b'p';
/// Colour markup; never framed.
pub const MARKUP_COLOR: u8 = b'c';
/// WebSocket channel markup; the first payload byte is the channel id.
pub const MARKUP_WS: u8 = b'w';
/// Starts fallback text hidden from WebSocket clients.
pub const MARKUP_WS_ALT: u8 = b'a';
/// Ends fallback text.
pub const MARKUP_WS_ALT_END: u8 = b'A';

/// Markup producer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MarkupError {
    /// The destination would exceed its limit.
    #[error("markup needs {needed} bytes but only {available} are available")]
    BufferFull {
        /// Bytes the markup requires.
        needed: usize,
        /// Bytes left before the limit.
        available: usize,
    },
    /// Channel data already contains a tag terminator.
    #[error("nested tag in channel data")]
    NestedTag,
}

fn tagged_len(data: &[u8], alt: Option<&[u8]>) -> usize {
    let mut needed = 0;
    if !data.is_empty() {
        needed += 4 + data.len();
    }
    if let Some(alt) = alt.filter(|a| !a.is_empty()) {
        needed += 6 + alt.len();
    }
    needed
}

/// Appends `data` tagged for `channel`, followed by optional fallback text
/// that non-WebSocket renderers show instead.
///
/// Empty `data` or `alt` is skipped. Nothing is written unless everything
/// fits within `limit` total bytes of `dst`.
pub fn markup_websocket(
    dst: &mut BytesMut,
    limit: usize,
    data: &[u8],
    alt: Option<&[u8]>,
    channel: Channel,
) -> Result<(), MarkupError> {
    let needed = tagged_len(data, alt);
    let available = limit.saturating_sub(dst.len());
    if needed > available {
        return Err(MarkupError::BufferFull { needed, available });
    }

    dst.reserve(needed);
    if !data.is_empty() {
        dst.put_u8(TAG_START);
        dst.put_u8(MARKUP_WS);
        dst.put_u8(channel.id());
        dst.put_slice(data);
        dst.put_u8(TAG_END);
    }
    if let Some(alt) = alt.filter(|a| !a.is_empty()) {
        dst.put_slice(&[TAG_START, MARKUP_WS_ALT, TAG_END]);
        dst.put_slice(alt);
        dst.put_slice(&[TAG_START, MARKUP_WS_ALT_END, TAG_END]);
    }
    Ok(())
}

/// Like [`markup_websocket`], but rejects channel data containing
/// [`TAG_END`], which would close the tag early.
pub fn markup_text(
    dst: &mut BytesMut,
    limit: usize,
    data: &[u8],
    alt: Option<&[u8]>,
    channel: Channel,
) -> Result<(), MarkupError> {
    if data.contains(&TAG_END) {
        return Err(MarkupError::NestedTag);
    }
    markup_websocket(dst, limit, data, alt, channel)
}

/// Escapes raw bytes and appends them tagged for [`Channel::Binary`].
pub fn markup_binary(
    dst: &mut BytesMut,
    limit: usize,
    raw: &[u8],
    alt: Option<&[u8]>,
) -> Result<(), MarkupError> {
    let encoded = escape::encode(raw);
    markup_websocket(dst, limit, &encoded, alt, Channel::Binary)
}
