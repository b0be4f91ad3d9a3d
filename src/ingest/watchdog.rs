use std::time::Duration;

use tokio::time::Instant;

/// Tracks how long a session has gone without accepting a new item.
///
/// A timeout of zero disables the watchdog.
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Option<Duration>,
    last_item: Instant,
}

impl Watchdog {
    pub fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout: (!timeout.is_zero()).then_some(timeout),
            last_item: now,
        }
    }

    /// Records that the session produced at least one new item.
    pub fn feed(&mut self, now: Instant) {
        self.last_item = now;
    }

    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_item)
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        match self.timeout {
            Some(timeout) => self.idle(now) >= timeout,
            None => false,
        }
    }

    /// The instant the session turns stale, if the watchdog is enabled.
    pub fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|timeout| self.last_item + timeout)
    }

    pub fn is_enabled(&self) -> bool {
        self.timeout.is_some()
    }
}
