//! Resumable decoder for masked client frames.
//!
//! The decoder walks inbound bytes through the header phases in wire order
//! (opcode, length, extended length, mask key, payload) and keeps every
//! partial field in [`DecodeState`], so a read may end at any byte.
//!
//! Text messages carry their channel as the first unmasked payload byte.
//! Only [`Channel::Text`] is accepted from clients: its bytes are emitted
//! with the selector stripped, and messages on any other channel are
//! consumed and discarded. Binary messages, control frames and reserved
//! opcodes are consumed and discarded as well.

use super::frame::{apply_mask, Opcode, WsError, FIN_BIT, LEN_16, LEN_64};
use super::policy::{FramePolicy, Permissive, SharedPolicy};
use super::state::{DecodePhase, DecodeState, FirstByte};
use crate::channel::Channel;
use crate::codec::Decoder;
use crate::tracing_compat::{debug, trace};
use bytes::BytesMut;
use std::sync::Arc;

/// Result of one decode call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeProgress {
    /// Application bytes appended to the output buffer.
    pub produced: usize,
    /// Text-channel messages whose final frame ended during this call.
    ///
    /// Lets callers find message boundaries in the output stream; callers
    /// that treat the output as a plain byte stream can ignore it.
    pub messages_completed: usize,
}

const fn is_control(header: u8) -> bool {
    header & 0x08 != 0
}

fn start_frame(state: &mut DecodeState, header: u8) {
    state.frame = header;
    let opcode = header & 0x0F;
    if is_control(opcode) {
        // Control frames may interleave with a fragmented message and
        // leave its state alone.
        return;
    }

    state.in_message = header & FIN_BIT == 0;
    match opcode {
        0x0 => {
            // Continue the message in progress; a discarded message stays
            // discarded.
            if state.first != FirstByte::Ignore {
                state.first = FirstByte::Emit;
            }
        }
        0x1 => {
            state.message = opcode;
            state.first = FirstByte::ExpectChannel;
        }
        _ => {
            state.message = opcode;
            state.first = FirstByte::Ignore;
        }
    }
}

fn finish_frame(state: &mut DecodeState, completed: &mut usize) {
    state.phase = DecodePhase::Opcode;
    state.mask_index = 0;
    if !is_control(state.frame) && state.frame_is_final() && state.first == FirstByte::Emit {
        *completed += 1;
    }
}

fn consume_payload(state: &mut DecodeState, chunk: &[u8], dst: &mut BytesMut) {
    let mut data = chunk;
    if !is_control(state.frame) && state.first == FirstByte::ExpectChannel {
        if let Some((&selector, rest)) = data.split_first() {
            let channel = selector ^ state.mask[usize::from(state.mask_index)];
            state.mask_index = (state.mask_index + 1) % 4;
            data = rest;
            if channel == Channel::Text.id() {
                state.first = FirstByte::Emit;
            } else {
                debug!(channel = %Channel::from_id(channel), "discarding inbound message");
                state.first = FirstByte::Ignore;
            }
        }
    }

    if !is_control(state.frame) && state.first == FirstByte::Emit {
        let offset = dst.len();
        dst.extend_from_slice(data);
        apply_mask(&mut dst[offset..], state.mask, u64::from(state.mask_index));
    }
    state.mask_index = ((usize::from(state.mask_index) + data.len()) % 4) as u8;
}

/// Decodes `src` against the persisted `state`, appending unmasked
/// application bytes to `dst`.
///
/// On a policy violation the state is reset to await a new frame header
/// and the error is returned; bytes already appended stay in `dst`.
pub fn decode_chunk(
    state: &mut DecodeState,
    policy: &dyn FramePolicy,
    src: &[u8],
    dst: &mut BytesMut,
) -> Result<DecodeProgress, WsError> {
    let start = dst.len();
    let mut completed = 0;
    let mut pos = 0;

    while pos < src.len() {
        match state.phase {
            DecodePhase::Opcode => {
                let header = src[pos];
                pos += 1;
                if let Err(err) = policy.check_frame_start(header, state.in_message) {
                    *state = DecodeState::new();
                    return Err(err);
                }
                start_frame(state, header);
                state.phase = DecodePhase::Length;
            }

            DecodePhase::Length => {
                let length = src[pos];
                pos += 1;
                if let Err(err) = policy.check_length_byte(state.frame, length) {
                    *state = DecodeState::new();
                    return Err(err);
                }
                state.remaining = 0;
                state.phase = match length & 0x7F {
                    LEN_16 => DecodePhase::ExtendedLength {
                        width: 2,
                        remaining: 2,
                    },
                    LEN_64 => DecodePhase::ExtendedLength {
                        width: 8,
                        remaining: 8,
                    },
                    len => {
                        state.remaining = u64::from(len);
                        DecodePhase::MaskKey { index: 0 }
                    }
                };
                trace!(
                    opcode = ?Opcode::from_u8(state.frame),
                    len = length & 0x7F,
                    "frame header"
                );
            }

            DecodePhase::ExtendedLength { width, remaining } => {
                state.remaining = (state.remaining << 8) | u64::from(src[pos]);
                pos += 1;
                if remaining > 1 {
                    state.phase = DecodePhase::ExtendedLength {
                        width,
                        remaining: remaining - 1,
                    };
                    continue;
                }

                match policy.extended_length(state.remaining, width) {
                    Ok(len) => state.remaining = len,
                    Err(err) => {
                        *state = DecodeState::new();
                        return Err(err);
                    }
                }
                state.phase = DecodePhase::MaskKey { index: 0 };
            }

            DecodePhase::MaskKey { index } => {
                state.mask[usize::from(index)] = src[pos];
                pos += 1;
                if index < 3 {
                    state.phase = DecodePhase::MaskKey { index: index + 1 };
                } else if state.remaining == 0 {
                    finish_frame(state, &mut completed);
                } else {
                    state.mask_index = 0;
                    state.phase = DecodePhase::Payload;
                }
            }

            DecodePhase::Payload => {
                let available = (src.len() - pos) as u64;
                let take = state.remaining.min(available) as usize;
                consume_payload(state, &src[pos..pos + take], dst);
                pos += take;
                state.remaining -= take as u64;
                if state.remaining == 0 {
                    finish_frame(state, &mut completed);
                }
            }
        }
    }

    Ok(DecodeProgress {
        produced: dst.len() - start,
        messages_completed: completed,
    })
}

/// Frame decoder that owns its state and policy.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecodeState,
    policy: SharedPolicy,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates a permissive decoder awaiting a frame header.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(Arc::new(Permissive))
    }

    /// Creates a decoder using `policy`.
    #[must_use]
    pub fn with_policy(policy: SharedPolicy) -> Self {
        Self {
            state: DecodeState::new(),
            policy,
        }
    }

    /// Resumes from a previously saved state.
    #[must_use]
    pub fn from_state(state: DecodeState, policy: SharedPolicy) -> Self {
        Self { state, policy }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &DecodeState {
        &self.state
    }

    /// Consumes the decoder, returning its state for persisting.
    #[must_use]
    pub fn into_state(self) -> DecodeState {
        self.state
    }

    /// Decodes `src`, appending application bytes to `dst`.
    pub fn feed(&mut self, src: &[u8], dst: &mut BytesMut) -> Result<DecodeProgress, WsError> {
        decode_chunk(&mut self.state, self.policy.as_ref(), src, dst)
    }
}

impl Decoder for FrameDecoder {
    type Item = BytesMut;
    type Error = WsError;

    /// Consumes all of `src` and returns the application bytes it carried.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, WsError> {
        let chunk = src.split();
        let mut out = BytesMut::with_capacity(chunk.len());
        self.feed(&chunk, &mut out)?;
        Ok((!out.is_empty()).then_some(out))
    }
}
