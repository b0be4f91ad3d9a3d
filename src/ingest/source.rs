//! Upstream adapter contract
//!
//! Adapter calls are blocking. The ingestion loop always runs them on the
//! blocking pool, so implementations may sleep or do synchronous I/O.

use serde::Deserialize;

use crate::utils::error::SourceError;

/// One chat item as extracted by the upstream adapter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatItem {
    pub id: String,
    pub timestamp_ms: i64,
    pub author: String,
    #[serde(alias = "message")]
    pub text: String,
}

impl ChatItem {
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
}

/// A live upstream session.
pub trait ChatSource: Send {
    /// Whether the upstream still considers this session valid.
    fn is_alive(&mut self) -> bool;

    /// Fetches the items that arrived since the previous poll.
    fn poll(&mut self) -> Result<Vec<ChatItem>, SourceError>;

    /// Ends the session. Must be idempotent; failures are swallowed.
    fn terminate(&mut self);
}

/// Builds fresh sessions. A failed session is always replaced wholesale.
pub trait SourceFactory: Send + Sync {
    /// Canonical URL of the upstream, sent to every new subscriber.
    fn source_url(&self) -> String;

    fn create(&self) -> Result<Box<dyn ChatSource>, SourceError>;
}
