//! # ChatRelay
//!
//! `chatrelay` relays a live chat stream, fetched by periodic polling of an
//! upstream source, to any number of WebSocket subscribers. It keeps a
//! bounded, deduplicated window of recent messages and survives upstream
//! failures by recreating the source session indefinitely.
//!
//! ## Core Modules
//!
//! - `buffer`: the rolling, deduplicated message window.
//! - `render`: word wrapping and the bordered plain / bold-author renderings.
//! - `hub`: subscriber registry, connect-time snapshot and broadcast fan-out.
//! - `ingest`: the upstream adapter contract and the resilient polling loop.
//! - `transport`: the subscriber wire frames and the WebSocket server.
//! - `driver`: wiring and shutdown.
//! - `config`: layered configuration loading.
//! - `utils`: error types and logging.

pub mod buffer;
pub mod config;
pub mod driver;
pub mod hub;
pub mod ingest;
pub mod render;
pub mod transport;
pub mod utils;
