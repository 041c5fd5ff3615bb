//! Logical output channels multiplexed onto WebSocket messages.
//!
//! Text messages carry their channel as the first payload byte; binary
//! messages imply [`Channel::Binary`] through the opcode.

use std::fmt;

/// Application-level channel carried inside WebSocket messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Plain text (the default channel).
    #[default]
    Text,
    /// JSON documents.
    Json,
    /// HTML fragments produced by the scripting layer.
    Html,
    /// Pueblo/HTML markup rendered by the output pipeline.
    Pueblo,
    /// Prompt lines.
    Prompt,
    /// Raw binary data, framed as a binary message.
    Binary,
    /// Any other channel id a producer chose to emit.
    Other(u8),
}

impl Channel {
    /// Sentinel accepted by [`crate::websocket::to_websocket_frame`] to
    /// request auto-multiplexing instead of a single explicit channel.
    pub const AUTO: u8 = 0;

    /// Returns the wire id of this channel.
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Text => b't',
            Self::Json => b'j',
            Self::Html => b'h',
            Self::Pueblo => b'p',
            Self::Prompt => b'>',
            Self::Binary => b'b',
            Self::Other(id) => id,
        }
    }

    /// Maps a wire id back to a channel.
    #[must_use]
    pub const fn from_id(id: u8) -> Self {
        match id {
            b't' => Self::Text,
            b'j' => Self::Json,
            b'h' => Self::Html,
            b'p' => Self::Pueblo,
            b'>' => Self::Prompt,
            b'b' => Self::Binary,
            other => Self::Other(other),
        }
    }

    /// Returns true if this channel is framed as a binary message.
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(self, Self::Binary)
    }
}

impl From<u8> for Channel {
    fn from(id: u8) -> Self {
        Self::from_id(id)
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> Self {
        channel.id()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Html => write!(f, "html"),
            Self::Pueblo => write!(f, "pueblo"),
            Self::Prompt => write!(f, "prompt"),
            Self::Binary => write!(f, "binary"),
            Self::Other(id) => write!(f, "channel 0x{id:02X}"),
        }
    }
}
