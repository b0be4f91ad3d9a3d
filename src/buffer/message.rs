use chrono::{Local, TimeZone};

/// A chat message accepted into the rolling buffer.
///
/// Messages are immutable once accepted. `timestamp_ms` is supplied by the
/// upstream source and is not assumed to be monotonic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub timestamp_ms: i64,
    pub author: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(
        id: impl Into<String>,
        timestamp_ms: i64,
        author: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp_ms,
            author: author.into(),
            text: text.into(),
        }
    }

    /// Local wall-clock time of the message as `HH:MM:SS`.
    pub fn clock(&self) -> String {
        match Local.timestamp_millis_opt(self.timestamp_ms).single() {
            Some(dt) => dt.format("%H:%M:%S").to_string(),
            None => "--:--:--".to_string(),
        }
    }

    /// The prefix that precedes the author, `HH:MM:SS - `.
    pub fn header_prefix(&self) -> String {
        format!("{} - ", self.clock())
    }

    /// `HH:MM:SS - <author>: <text>`
    pub fn header(&self) -> String {
        format!("{}{}: {}", self.header_prefix(), self.author, self.text)
    }
}
