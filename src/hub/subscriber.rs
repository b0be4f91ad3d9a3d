//! Subscriber representation
//!
//! A `Subscriber` is the hub's handle on one open connection: an id and the
//! sending side of a bounded per-connection queue. The transport drains the
//! queue into the socket. Closing the socket is the transport's job; the hub
//! only ever drops its handle.

use tokio::sync::mpsc::Sender;
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

pub type SubscriberId = String;

#[derive(Debug)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub sender: Sender<WsMessage>,
}

impl Subscriber {
    /// Create a new subscriber with a fresh `sub-<uuid>` id.
    pub fn new(sender: Sender<WsMessage>) -> Self {
        Self {
            id: format!("sub-{}", Uuid::new_v4()),
            sender,
        }
    }
}
