//! The `transport` module is responsible for network communication with
//! subscribers over WebSockets.
//!
//! It defines the two frame kinds sent to subscribers and implements the
//! WebSocket server: accepting connections, registering each one with the
//! hub and pumping its outbound queue into the socket.

pub mod frame;
pub mod websocket;

pub use frame::Frame;
pub use websocket::{ServerOptions, bind, serve};
