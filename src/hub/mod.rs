//! The `hub` module tracks live subscribers and fans frames out to them.
//!
//! `BroadcastHub` is plain synchronous state. It is owned through a
//! [`HubHandle`], which serialises every mutation behind one lock so that
//! connect-time snapshots and broadcasts can never interleave.

pub mod engine;
pub mod handle;
pub mod subscriber;

pub use engine::BroadcastHub;
pub use handle::HubHandle;
pub use subscriber::{Subscriber, SubscriberId};
