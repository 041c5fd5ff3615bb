//! Per-connection driver tying the handshake, decoder and multiplexer
//! together.
//!
//! A [`WsSession`] sits between a connection's socket and the server's
//! line processing. Raw bytes go in through [`WsSession::receive`] and come
//! back out as application input; server output goes in through
//! [`WsSession::send_output`] and leaves through
//! [`WsSession::take_outbound`], framed once the connection is upgraded.
//!
//! ```
//! use wsbridge::session::WsSession;
//! use wsbridge::WsConfig;
//!
//! let mut session = WsSession::new(&WsConfig::default()).unwrap();
//! let received = session
//!     .receive(b"GET /wsclient HTTP/1.1\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n")
//!     .unwrap();
//! assert!(received.input.is_empty());
//! assert!(session.is_framed());
//! assert!(session.take_outbound().starts_with(b"HTTP/1.1 101"));
//! ```

use crate::codec::{Decoder, LinesCodec};
use crate::config::WsConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::tracing_compat::debug;
use crate::websocket::{
    decode_chunk, ConnectionState, HandshakeError, HandshakeStep, Multiplexer, Negotiator,
    ProtocolMode, SharedPolicy,
};
use bytes::BytesMut;

/// Application input recovered from one [`WsSession::receive`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Received {
    /// Bytes for the server's input processing: whole lines in plain mode,
    /// unmasked text-channel payload in framed mode.
    pub input: BytesMut,
    /// Text-channel messages that finished in this call.
    pub messages_completed: usize,
}

/// WebSocket adapter state for one connection.
#[derive(Debug)]
pub struct WsSession {
    negotiator: Negotiator,
    policy: SharedPolicy,
    mux: Multiplexer,
    lines: LinesCodec,
    conn: ConnectionState,
    pending: BytesMut,
    outbound: BytesMut,
    // Inside a plain line too long to be the upgrade request.
    long_line: bool,
    closed: bool,
}

impl WsSession {
    /// Creates a session in plain line mode.
    pub fn new(config: &WsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            negotiator: config.negotiator(),
            policy: config.policy(),
            mux: config.multiplexer(),
            lines: LinesCodec::new_with_max_length(config.max_header_line),
            conn: ConnectionState::new(),
            pending: BytesMut::new(),
            outbound: BytesMut::new(),
            long_line: false,
            closed: false,
        })
    }

    /// Returns the protocol state.
    #[must_use]
    pub const fn connection(&self) -> &ConnectionState {
        &self.conn
    }

    /// Returns the protocol mode.
    #[must_use]
    pub const fn mode(&self) -> ProtocolMode {
        self.conn.mode()
    }

    /// Returns true once the connection exchanges frames.
    #[must_use]
    pub const fn is_framed(&self) -> bool {
        self.conn.is_framed()
    }

    /// Returns true if the connection should be closed once the outbound
    /// buffer is flushed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Processes bytes read from the socket.
    ///
    /// Errors mark the session closed; anything queued for the client
    /// (such as the 426 response) is still available from
    /// [`WsSession::take_outbound`].
    pub fn receive(&mut self, data: &[u8]) -> Result<Received> {
        if self.closed {
            if self.conn.mode() == ProtocolMode::Rejected {
                return Err(HandshakeError::MissingKey.into());
            }
            return Err(Error::new(ErrorKind::HandshakeState)
                .with_message(format!("connection closed in {} mode", self.conn.mode())));
        }
        let result = self.receive_inner(data);
        if result.is_err() {
            self.closed = true;
        }
        result
    }

    fn receive_inner(&mut self, data: &[u8]) -> Result<Received> {
        let mut received = Received::default();
        if self.conn.is_framed() {
            self.decode_frames(data, &mut received)?;
            return Ok(received);
        }

        self.pending.extend_from_slice(data);
        while !self.conn.is_framed() && !self.closed {
            if self.long_line {
                if !self.pass_long_line(&mut received) {
                    break;
                }
                continue;
            }
            match self.lines.decode(&mut self.pending) {
                Ok(Some(line)) => self.handle_line(&line, &mut received)?,
                Ok(None) => break,
                Err(err) if self.conn.mode() == ProtocolMode::Plain => {
                    debug!(error = %err, "passing long plain line through");
                    self.long_line = true;
                    self.lines = LinesCodec::new_with_max_length(self.lines.max_length());
                }
                Err(err) => return Err(err.into()),
            }
        }

        if self.conn.is_framed() && !self.pending.is_empty() {
            // Frames pipelined behind the handshake.
            let rest = self.pending.split();
            self.decode_frames(&rest, &mut received)?;
        }
        Ok(received)
    }

    fn handle_line(&mut self, line: &[u8], received: &mut Received) -> Result<()> {
        match self.conn.mode() {
            ProtocolMode::Plain => {
                if self.negotiator.recognizes(line) {
                    self.negotiator.begin(&mut self.conn, line)?;
                } else {
                    received.input.extend_from_slice(line);
                    received.input.extend_from_slice(b"\n");
                }
            }
            ProtocolMode::AwaitingUpgrade => {
                match self.negotiator.consume_header_line(&mut self.conn, line)? {
                    HandshakeStep::Continue => {}
                    HandshakeStep::Accepted { response } => {
                        self.outbound.extend_from_slice(&response);
                    }
                    HandshakeStep::Rejected { response } => {
                        self.outbound.extend_from_slice(response);
                        self.closed = true;
                    }
                }
            }
            ProtocolMode::Framed | ProtocolMode::Rejected => {}
        }
        Ok(())
    }

    /// Forwards the rest of an overlong plain line. Returns true once its
    /// terminator has been consumed.
    fn pass_long_line(&mut self, received: &mut Received) -> bool {
        if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw = self.pending.split_to(pos + 1);
            let line = &raw[..pos];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            received.input.extend_from_slice(line);
            received.input.extend_from_slice(b"\n");
            self.long_line = false;
            return true;
        }
        // Hold back a CR that may start the terminator.
        let keep = usize::from(self.pending.last() == Some(&b'\r'));
        let chunk = self.pending.split_to(self.pending.len() - keep);
        received.input.extend_from_slice(&chunk);
        false
    }

    fn decode_frames(&mut self, data: &[u8], received: &mut Received) -> Result<()> {
        let progress = decode_chunk(
            self.conn.decode_state_mut(),
            self.policy.as_ref(),
            data,
            &mut received.input,
        )
        .map_err(|err| {
            debug!(error = %err, "frame rejected by policy, closing");
            err
        })?;
        received.messages_completed += progress.messages_completed;
        Ok(())
    }

    /// Queues server output for the client.
    ///
    /// Once framed, output is multiplexed by `channel_id`
    /// ([`Channel::AUTO`](crate::channel::Channel::AUTO) scans for channel
    /// markup). In plain mode it is passed through unchanged. Output sent
    /// during the handshake or after a rejection is dropped.
    pub fn send_output(&mut self, output: &[u8], channel_id: u8) {
        match self.conn.mode() {
            ProtocolMode::Framed => {
                let frames = self.mux.emit(output, channel_id);
                self.outbound.extend_from_slice(&frames);
            }
            ProtocolMode::Plain => self.outbound.extend_from_slice(output),
            ProtocolMode::AwaitingUpgrade | ProtocolMode::Rejected => {
                debug!(
                    mode = %self.conn.mode(),
                    len = output.len(),
                    "dropping output outside line or frame mode"
                );
            }
        }
    }

    /// Takes everything queued for the socket.
    pub fn take_outbound(&mut self) -> BytesMut {
        self.outbound.split()
    }
}
