//! The `ingest` module drives the upstream chat source.
//!
//! It defines the adapter contract an upstream source must implement
//! ([`ChatSource`] and [`SourceFactory`]), a file-tailing adapter
//! ([`JsonLinesFeed`]), and the [`IngestionLoop`] that polls the source,
//! feeds the rolling buffer and recreates the session whenever it dies,
//! fails or goes quiet for too long.

pub mod console;
pub mod engine;
pub mod feed;
pub mod source;
pub mod watchdog;

pub use console::{ConsoleSink, StdoutConsole};
pub use engine::{IngestOptions, IngestReport, IngestStats, IngestionLoop, LoopState, RecreateReason};
pub use feed::{JsonLinesFeed, JsonLinesFeedFactory};
pub use source::{ChatItem, ChatSource, SourceFactory};
pub use watchdog::Watchdog;

#[cfg(test)]
mod tests;
