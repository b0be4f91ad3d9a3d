use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::hub::engine::BroadcastHub;
use crate::hub::subscriber::{Subscriber, SubscriberId};

/// Shared owner of the [`BroadcastHub`].
///
/// Every method takes the lock for the duration of one synchronous hub call
/// and never across an `.await`. A poisoned lock is recovered: the hub holds
/// no invariant that a panicking sender could break halfway.
#[derive(Debug, Clone)]
pub struct HubHandle {
    inner: Arc<Mutex<BroadcastHub>>,
}

impl HubHandle {
    pub fn new(hub: BroadcastHub) -> Self {
        Self {
            inner: Arc::new(Mutex::new(hub)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BroadcastHub> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn connect(&self, subscriber: Subscriber) -> bool {
        self.lock().on_connect(subscriber)
    }

    pub fn broadcast(&self, text: &str) -> usize {
        self.lock().broadcast(text)
    }

    pub fn remove(&self, id: &SubscriberId) -> bool {
        self.lock().remove(id)
    }

    pub fn shutdown(&self, reason: &str) -> usize {
        self.lock().shutdown(reason)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    pub fn snapshot(&self) -> String {
        self.lock().snapshot().to_string()
    }
}
