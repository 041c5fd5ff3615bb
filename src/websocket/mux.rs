//! Outbound framing and channel multiplexing.
//!
//! The server hands this module raw output, either for one explicit
//! channel or as a marked-up stream ([`Channel::AUTO`]). In the marked-up
//! case the stream is scanned for `TAG_START code body TAG_END` runs:
//!
//! | code | effect                                              |
//! |------|-----------------------------------------------------|
//! | `p`  | body goes out on the Pueblo channel                 |
//! | `w`  | first body byte names the channel, rest is the data |
//! | `a`  | suppress plain text until `A`                       |
//! | `A`  | end suppression                                     |
//!
//! Plain text between tags goes out on the text channel. Every run
//! becomes its own final frame in one bounded output buffer; frames that
//! do not fit are truncated, and dropped once not even a header fits.

use super::frame::{put_header, Opcode, MAX_HEADER_LEN};
use crate::channel::Channel;
use crate::codec::Encoder;
use crate::escape;
use crate::markup::{MARKUP_HTML, MARKUP_WS, MARKUP_WS_ALT, MARKUP_WS_ALT_END, TAG_END, TAG_START};
use crate::tracing_compat::debug;
use bytes::{BufMut, Bytes, BytesMut};
use std::convert::Infallible;

/// Default output buffer capacity, in bytes.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 32 * 1024;
/// Default scratch capacity for unescaping binary payloads.
pub const DEFAULT_SCRATCH_CAPACITY: usize = 8 * 1024;

/// Appends server frames to a buffer of fixed capacity.
#[derive(Debug)]
pub struct FrameWriter {
    buf: BytesMut,
    capacity: usize,
}

impl FrameWriter {
    /// Creates an empty writer holding at most `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes still available.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.buf.len())
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes `payload` as one final frame on `channel` and returns how
    /// many payload bytes went out.
    ///
    /// Binary payloads become binary frames. Everything else becomes a
    /// text frame whose payload starts with the channel selector byte.
    /// With fewer than [`MAX_HEADER_LEN`] bytes left the frame is dropped;
    /// otherwise the payload is cut to what fits after a worst-case header.
    pub fn write_message(&mut self, payload: &[u8], channel: Channel) -> usize {
        let Some(room) = self.remaining().checked_sub(MAX_HEADER_LEN) else {
            debug!(
                channel = %channel,
                len = payload.len(),
                remaining = self.remaining(),
                "output buffer full, dropping frame"
            );
            return 0;
        };

        let len = payload.len().min(room);
        if len < payload.len() {
            debug!(
                channel = %channel,
                requested = payload.len(),
                written = len,
                "truncating frame payload"
            );
        }

        if channel.is_binary() {
            put_header(&mut self.buf, Opcode::Binary, len);
        } else {
            put_header(&mut self.buf, Opcode::Text, len + 1);
            self.buf.put_u8(channel.id());
        }
        self.buf.put_slice(&payload[..len]);
        len
    }

    /// Returns the written frames.
    #[must_use]
    pub fn into_inner(self) -> BytesMut {
        self.buf
    }
}

/// Turns server output into frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Multiplexer {
    output_capacity: usize,
    scratch_capacity: usize,
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Multiplexer {
    /// Creates a multiplexer with the default capacities.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
        }
    }

    /// Sets the output buffer capacity for each call.
    #[must_use]
    pub const fn output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity;
        self
    }

    /// Sets the scratch capacity used to unescape binary payloads.
    #[must_use]
    pub const fn scratch_capacity(mut self, capacity: usize) -> Self {
        self.scratch_capacity = capacity;
        self
    }

    /// Frames `input` for the channel with id `channel_id`, scanning for
    /// markup when it is [`Channel::AUTO`].
    #[must_use]
    pub fn emit(&self, input: &[u8], channel_id: u8) -> BytesMut {
        if channel_id == Channel::AUTO {
            self.emit_auto(input)
        } else {
            self.emit_direct(input, Channel::from_id(channel_id))
        }
    }

    /// Frames all of `input` as one message on `channel`.
    #[must_use]
    pub fn emit_direct(&self, input: &[u8], channel: Channel) -> BytesMut {
        let mut writer = FrameWriter::new(self.output_capacity);
        writer.write_message(input, channel);
        writer.into_inner()
    }

    /// Splits marked-up `input` into per-channel frames.
    #[must_use]
    pub fn emit_auto(&self, input: &[u8]) -> BytesMut {
        let mut writer = FrameWriter::new(self.output_capacity);
        let mut start = 0;
        let mut tag: Option<usize> = None;
        let mut suppress = false;

        for (pos, &byte) in input.iter().enumerate() {
            match byte {
                TAG_START => {
                    if tag.is_some() {
                        continue;
                    }
                    if !suppress && start < pos {
                        writer.write_message(&input[start..pos], Channel::Text);
                    }
                    tag = Some(pos + 1);
                }
                TAG_END => {
                    if let Some(body) = tag.take() {
                        self.write_tag(&mut writer, &input[body..pos], &mut suppress);
                    }
                    start = pos + 1;
                }
                _ => {}
            }
        }

        // An unterminated tag swallows the rest of the input.
        if !suppress && tag.is_none() && start < input.len() {
            writer.write_message(&input[start..], Channel::Text);
        }
        writer.into_inner()
    }

    fn write_tag(&self, writer: &mut FrameWriter, tag: &[u8], suppress: &mut bool) {
        let Some((&code, body)) = tag.split_first() else {
            return;
        };
        match code {
            MARKUP_HTML => {
                writer.write_message(body, Channel::Pueblo);
            }
            MARKUP_WS => {
                let Some((&id, data)) = body.split_first() else {
                    debug!("channel tag without channel, dropping");
                    return;
                };
                let channel = Channel::from_id(id);
                if channel.is_binary() {
                    self.write_binary(writer, data);
                } else {
                    writer.write_message(data, channel);
                }
            }
            MARKUP_WS_ALT => *suppress = true,
            MARKUP_WS_ALT_END => *suppress = false,
            _ => {}
        }
    }

    fn write_binary(&self, writer: &mut FrameWriter, escaped: &[u8]) {
        let mut scratch = vec![0u8; self.scratch_capacity.min(escaped.len())];
        match escape::decode_into(escaped, &mut scratch) {
            Ok(len) => {
                writer.write_message(&scratch[..len], Channel::Binary);
            }
            Err(err) => {
                debug!(error = %err, len = escaped.len(), "dropping binary segment");
            }
        }
    }
}

/// Frames `input` for `channel_id` with the default capacities.
#[must_use]
pub fn to_websocket_frame(input: &[u8], channel_id: u8) -> BytesMut {
    Multiplexer::new().emit(input, channel_id)
}

/// One unit of server output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Marked-up output to scan for channel tags.
    Auto(Bytes),
    /// Output for a single channel.
    Direct(Channel, Bytes),
}

impl Encoder<Outbound> for Multiplexer {
    type Error = Infallible;

    fn encode(&mut self, item: Outbound, dst: &mut BytesMut) -> Result<(), Infallible> {
        let frames = match item {
            Outbound::Auto(data) => self.emit_auto(&data),
            Outbound::Direct(channel, data) => self.emit_direct(&data, channel),
        };
        dst.extend_from_slice(&frames);
        Ok(())
    }
}
