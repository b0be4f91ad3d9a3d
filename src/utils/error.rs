//! Error types used by `chatrelay`.
//!
//! - [`RelayError`]: startup and wiring failures surfaced to `main`.
//! - [`SourceError`]: failures raised by an upstream chat adapter. These are
//!   always recoverable; the ingestion loop answers every one of them by
//!   recreating the session.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no chat source configured (set source.feed_path or pass --feed)")]
    MissingSource,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to create source session: {0}")]
    Create(String),

    #[error("poll failed: {0}")]
    Poll(String),

    #[error("source io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// Short stable label for log fields.
    pub fn as_label(&self) -> &'static str {
        match self {
            SourceError::Create(_) => "source_create",
            SourceError::Poll(_) => "source_poll",
            SourceError::Io(_) => "source_io",
        }
    }
}
