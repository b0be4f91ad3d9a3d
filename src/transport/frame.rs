//! Subscriber wire frames
//!
//! Every frame is a text WebSocket message whose kind is given by a literal
//! prefix:
//! - `Data::<source-url>`: sent once, first, on connect
//! - `ChatBuffer::<rendered-text>`: the bold-author rendering of the buffer

use std::fmt;

use tungstenite::protocol::Message as WsMessage;

pub const DATA_PREFIX: &str = "Data::";
pub const CHAT_BUFFER_PREFIX: &str = "ChatBuffer::";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(String),
    ChatBuffer(String),
}

impl Frame {
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parses a raw frame. Unknown prefixes yield `None`.
    pub fn parse(raw: &str) -> Option<Frame> {
        if let Some(rest) = raw.strip_prefix(DATA_PREFIX) {
            Some(Frame::Data(rest.to_string()))
        } else {
            raw.strip_prefix(CHAT_BUFFER_PREFIX)
                .map(|rest| Frame::ChatBuffer(rest.to_string()))
        }
    }

    pub fn to_ws(&self) -> WsMessage {
        WsMessage::text(self.encode())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Data(url) => write!(f, "{DATA_PREFIX}{url}"),
            Frame::ChatBuffer(text) => write!(f, "{CHAT_BUFFER_PREFIX}{text}"),
        }
    }
}
