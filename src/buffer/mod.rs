//! The `buffer` module holds the rolling retention window of chat messages.
//!
//! `RollingBuffer` keeps at most `capacity` messages in arrival order,
//! suppresses duplicate ids that are still resident and evicts the oldest
//! message first when full.

pub mod message;
pub mod rolling;

pub use message::ChatMessage;
pub use rolling::RollingBuffer;
