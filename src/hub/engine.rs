//! Broadcast hub
//!
//! Holds the set of open subscribers together with the last announced
//! buffer rendering. Responsibilities:
//! - greet a new subscriber and hand it the current snapshot
//! - fan every broadcast out to all subscribers
//! - drop a subscriber whose queue is closed or full, without affecting the
//!   others and without ever blocking the caller
//!
//! The snapshot handed to a new subscriber is the text of the most recent
//! broadcast. Registration and the snapshot happen under the same `&mut self`
//! borrow as `broadcast`, so a subscriber sees either the old snapshot
//! followed by the next broadcast, or the new snapshot and nothing twice.

use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;
use tungstenite::protocol::frame::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

use crate::hub::subscriber::{Subscriber, SubscriberId};
use crate::transport::frame::Frame;

#[derive(Debug)]
pub struct BroadcastHub {
    subscribers: HashMap<SubscriberId, Subscriber>,
    source_url: String,
    snapshot: String,
    broadcasts: u64,
    closing: Option<String>,
}

impl BroadcastHub {
    pub fn new(source_url: impl Into<String>, initial_snapshot: impl Into<String>) -> Self {
        Self {
            subscribers: HashMap::new(),
            source_url: source_url.into(),
            snapshot: initial_snapshot.into(),
            broadcasts: 0,
            closing: None,
        }
    }

    /// Registers a subscriber and queues its greeting and snapshot frames.
    ///
    /// Returns `false` (and keeps nothing) if either frame cannot be queued.
    /// Once the hub has shut down, only the close frame is queued.
    pub fn on_connect(&mut self, subscriber: Subscriber) -> bool {
        if let Some(reason) = &self.closing {
            if let Err(e) = subscriber.sender.try_send(close_frame(reason)) {
                debug!(subscriber = %subscriber.id, "close not queued: {}", describe(&e));
            }
            debug!(subscriber = %subscriber.id, "hub shut down, connection refused");
            return false;
        }

        let greeting = Frame::Data(self.source_url.clone()).to_ws();
        let snapshot = Frame::ChatBuffer(self.snapshot.clone()).to_ws();

        if let Err(e) = subscriber
            .sender
            .try_send(greeting)
            .and_then(|_| subscriber.sender.try_send(snapshot))
        {
            warn!(subscriber = %subscriber.id, "failed to queue greeting: {}", describe(&e));
            return false;
        }

        info!(subscriber = %subscriber.id, open = self.subscribers.len() + 1, "subscriber connected");
        self.subscribers.insert(subscriber.id.clone(), subscriber);
        true
    }

    /// Sends `text` as a `ChatBuffer` frame to every open subscriber.
    ///
    /// Subscribers whose queue is closed or full are removed. Returns the
    /// number of subscribers the frame was queued for.
    pub fn broadcast(&mut self, text: &str) -> usize {
        self.snapshot = text.to_string();
        self.broadcasts += 1;

        let message = Frame::ChatBuffer(self.snapshot.clone()).to_ws();
        let mut dropped = Vec::new();

        for (id, subscriber) in &self.subscribers {
            if let Err(e) = subscriber.sender.try_send(message.clone()) {
                warn!(subscriber = %id, "dropping subscriber: {}", describe(&e));
                dropped.push(id.clone());
            }
        }

        for id in &dropped {
            self.subscribers.remove(id);
        }

        debug!(
            delivered = self.subscribers.len(),
            dropped = dropped.len(),
            "broadcast queued"
        );
        self.subscribers.len()
    }

    /// Forgets a subscriber. Returns whether it was registered.
    pub fn remove(&mut self, id: &SubscriberId) -> bool {
        let removed = self.subscribers.remove(id).is_some();
        if removed {
            info!(subscriber = %id, open = self.subscribers.len(), "subscriber removed");
        }
        removed
    }

    /// Queues a close frame with `reason` for every subscriber and forgets
    /// them all. Later connections are refused with the same frame. Failures
    /// are ignored. Returns how many were notified.
    pub fn shutdown(&mut self, reason: &str) -> usize {
        self.closing = Some(reason.to_string());
        let mut notified = 0;
        for (id, subscriber) in self.subscribers.drain() {
            match subscriber.sender.try_send(close_frame(reason)) {
                Ok(()) => notified += 1,
                Err(e) => debug!(subscriber = %id, "close not queued: {}", describe(&e)),
            }
        }
        notified
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn is_closing(&self) -> bool {
        self.closing.is_some()
    }

    pub fn broadcasts(&self) -> u64 {
        self.broadcasts
    }
}

fn close_frame(reason: &str) -> WsMessage {
    WsMessage::Close(Some(CloseFrame {
        code: CloseCode::Away,
        reason: reason.to_string().into(),
    }))
}

fn describe<T>(err: &TrySendError<T>) -> &'static str {
    match err {
        TrySendError::Full(_) => "queue full",
        TrySendError::Closed(_) => "connection closed",
    }
}
