//! The `utils` module provides shared building blocks used across the
//! `chatrelay` crate: typed errors and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{RelayError, SourceError};
