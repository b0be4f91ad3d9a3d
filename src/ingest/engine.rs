//! Ingestion loop
//!
//! Two states, no terminal one:
//! - `Active`: poll the session, apply the batch to the buffer, render and
//!   broadcast once if anything was accepted, then check the watchdog.
//! - `Recreating`: terminate the old session, wait `retry_wait`, build a
//!   new one.
//!
//! Dead liveness, poll failure, staleness, creation failure and a panicking
//! adapter all take the same recreate path. A poll that hangs past the
//! staleness limit counts as stale. Retries are unlimited and the
//! wait never grows. Every adapter call runs on the blocking pool, and every
//! wait races the shutdown token, so cancellation is observed promptly.

use std::sync::Arc;
use std::time::Duration;

use tokio::task;
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::buffer::RollingBuffer;
use crate::hub::HubHandle;
use crate::ingest::console::ConsoleSink;
use crate::ingest::source::{ChatItem, ChatSource, SourceFactory};
use crate::ingest::watchdog::Watchdog;
use crate::render::Renderer;

/// Upper bound on waiting for an adapter's `terminate`.
const TERMINATE_BUDGET: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Active,
    Recreating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecreateReason {
    NotAlive,
    PollFailed,
    Stale,
    CreateFailed,
    Crashed,
}

impl RecreateReason {
    pub fn as_label(&self) -> &'static str {
        match self {
            RecreateReason::NotAlive => "not_alive",
            RecreateReason::PollFailed => "poll_failed",
            RecreateReason::Stale => "stale",
            RecreateReason::CreateFailed => "create_failed",
            RecreateReason::Crashed => "crashed",
        }
    }
}

/// Counters kept by the loop, returned when it stops.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub cycles: u64,
    pub accepted: u64,
    pub duplicates: u64,
    pub broadcasts: u64,
    pub sessions: u64,
    pub not_alive: u64,
    pub poll_failures: u64,
    pub stale: u64,
    pub create_failures: u64,
    pub crashes: u64,
}

impl IngestStats {
    fn record(&mut self, reason: RecreateReason) {
        match reason {
            RecreateReason::NotAlive => self.not_alive += 1,
            RecreateReason::PollFailed => self.poll_failures += 1,
            RecreateReason::Stale => self.stale += 1,
            RecreateReason::CreateFailed => self.create_failures += 1,
            RecreateReason::Crashed => self.crashes += 1,
        }
    }

    /// Total number of times the recreate path was entered.
    pub fn recreations(&self) -> u64 {
        self.not_alive + self.poll_failures + self.stale + self.create_failures + self.crashes
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub capacity: usize,
    pub max_lines: usize,
    pub retry_wait: Duration,
    /// Zero disables the staleness watchdog.
    pub stale_timeout: Duration,
    /// Pause between poll cycles.
    pub poll_interval: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            capacity: 10,
            max_lines: 0,
            retry_wait: Duration::from_secs(5),
            stale_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// What the loop leaves behind once cancelled.
#[derive(Debug)]
pub struct IngestReport {
    pub stats: IngestStats,
    pub buffer: RollingBuffer,
}

struct SourceSession {
    source: Box<dyn ChatSource>,
    watchdog: Watchdog,
}

pub struct IngestionLoop {
    factory: Arc<dyn SourceFactory>,
    buffer: RollingBuffer,
    renderer: Renderer,
    hub: HubHandle,
    console: Option<Box<dyn ConsoleSink>>,
    options: IngestOptions,
    shutdown: CancellationToken,
    session: Option<SourceSession>,
    state: LoopState,
    stats: IngestStats,
}

impl IngestionLoop {
    pub fn new(
        factory: Arc<dyn SourceFactory>,
        renderer: Renderer,
        hub: HubHandle,
        options: IngestOptions,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            factory,
            buffer: RollingBuffer::new(options.capacity),
            renderer,
            hub,
            console: None,
            options,
            shutdown,
            session: None,
            state: LoopState::Recreating,
            stats: IngestStats::default(),
        }
    }

    pub fn with_console(mut self, console: Box<dyn ConsoleSink>) -> Self {
        self.console = Some(console);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs until the shutdown token is cancelled.
    ///
    /// The first session is opened without waiting; every later one waits
    /// `retry_wait` first.
    pub async fn run(mut self) -> IngestReport {
        info!(url = %self.factory.source_url(), "ingestion loop started");

        if let Err(reason) = self.open_session().await {
            self.enter_recreating(reason);
        }

        while !self.shutdown.is_cancelled() {
            match self.state {
                LoopState::Active => match self.cycle().await {
                    Ok(()) => {
                        if !pause(&self.shutdown, self.options.poll_interval).await {
                            break;
                        }
                    }
                    Err(reason) => self.enter_recreating(reason),
                },
                LoopState::Recreating => self.recreate().await,
            }
        }

        self.close_session().await;
        info!(
            cycles = self.stats.cycles,
            accepted = self.stats.accepted,
            recreations = self.stats.recreations(),
            "ingestion loop stopped"
        );
        IngestReport {
            stats: self.stats,
            buffer: self.buffer,
        }
    }

    /// One poll cycle of the `Active` state.
    async fn cycle(&mut self) -> Result<(), RecreateReason> {
        let Some(SourceSession { mut source, watchdog }) = self.session.take() else {
            return Err(RecreateReason::NotAlive);
        };
        self.stats.cycles += 1;

        let deadline = watchdog.deadline();
        let call = task::spawn_blocking(move || {
            let polled = source.is_alive().then(|| source.poll());
            (source, polled)
        });

        // Leaving the select early abandons the session along with the
        // blocking call; it is dropped, never terminated, once the call returns.
        let (source, polled) = tokio::select! {
            _ = self.shutdown.cancelled() => return Ok(()),
            _ = stale_at(deadline) => {
                warn!(
                    idle_secs = watchdog.idle(Instant::now()).as_secs(),
                    "poll still running past the staleness limit, abandoning session"
                );
                return Err(RecreateReason::Stale);
            }
            joined = call => match joined {
                Ok(result) => result,
                Err(e) => {
                    error!("source adapter panicked: {e}");
                    return Err(RecreateReason::Crashed);
                }
            },
        };
        self.session = Some(SourceSession { source, watchdog });

        let batch = match polled {
            None => return Err(RecreateReason::NotAlive),
            Some(Err(e)) => {
                warn!(error = %e, label = e.as_label(), "poll failed");
                return Err(RecreateReason::PollFailed);
            }
            Some(Ok(batch)) => batch,
        };

        let now = Instant::now();
        if self.apply(&batch) {
            if let Some(session) = self.session.as_mut() {
                session.watchdog.feed(now);
            }
            self.publish();
        }

        match self.session.as_ref() {
            Some(session) if session.watchdog.is_stale(now) => {
                warn!(
                    idle_secs = session.watchdog.idle(now).as_secs(),
                    "no new items while alive, treating session as stale"
                );
                Err(RecreateReason::Stale)
            }
            _ => Ok(()),
        }
    }

    /// Applies a batch in arrival order. Returns whether anything was accepted.
    fn apply(&mut self, batch: &[ChatItem]) -> bool {
        let mut dirty = false;
        for item in batch {
            if self
                .buffer
                .add(&item.id, item.timestamp_ms, &item.author, &item.text)
            {
                self.stats.accepted += 1;
                dirty = true;
            } else {
                self.stats.duplicates += 1;
            }
        }
        if !batch.is_empty() {
            debug!(batch = batch.len(), dirty, "batch applied");
        }
        dirty
    }

    /// Renders once and hands the result to the console and the hub.
    fn publish(&mut self) {
        let max_lines = self.options.max_lines;
        if let Some(console) = self.console.as_mut() {
            console.emit(&self.renderer.render(&self.buffer, false, max_lines));
        }
        let delivered = self
            .hub
            .broadcast(&self.renderer.render(&self.buffer, true, max_lines));
        self.stats.broadcasts += 1;
        debug!(delivered, "buffer broadcast");
    }

    fn enter_recreating(&mut self, reason: RecreateReason) {
        self.stats.record(reason);
        warn!(
            reason = reason.as_label(),
            retry_in_secs = self.options.retry_wait.as_secs_f64(),
            "recreating source session"
        );
        self.state = LoopState::Recreating;
    }

    async fn recreate(&mut self) {
        self.close_session().await;
        if !pause(&self.shutdown, self.options.retry_wait).await {
            return;
        }
        if let Err(reason) = self.open_session().await {
            self.enter_recreating(reason);
        }
    }

    async fn open_session(&mut self) -> Result<(), RecreateReason> {
        let factory = self.factory.clone();
        let created = tokio::select! {
            _ = self.shutdown.cancelled() => return Ok(()),
            joined = task::spawn_blocking(move || factory.create()) => joined,
        };

        match created {
            Ok(Ok(source)) => {
                self.session = Some(SourceSession {
                    source,
                    watchdog: Watchdog::new(self.options.stale_timeout, Instant::now()),
                });
                self.state = LoopState::Active;
                self.stats.sessions += 1;
                info!(session = self.stats.sessions, "source session created");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %e, "source creation failed");
                Err(RecreateReason::CreateFailed)
            }
            Err(e) => {
                error!("source factory panicked: {e}");
                Err(RecreateReason::Crashed)
            }
        }
    }

    /// Best-effort terminate of the current session, if any.
    async fn close_session(&mut self) {
        let Some(SourceSession { mut source, .. }) = self.session.take() else {
            return;
        };
        let call = task::spawn_blocking(move || source.terminate());
        match timeout(TERMINATE_BUDGET, call).await {
            Ok(Ok(())) => debug!("source session terminated"),
            Ok(Err(e)) => warn!("source terminate panicked: {e}"),
            Err(_) => warn!("source terminate did not finish in time"),
        }
    }
}

/// Completes at `deadline`, or never if there is none.
async fn stale_at(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Cancellable sleep. Returns `false` if shutdown was requested.
async fn pause(shutdown: &CancellationToken, duration: Duration) -> bool {
    if duration.is_zero() {
        task::yield_now().await;
        return !shutdown.is_cancelled();
    }
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = sleep(duration) => true,
    }
}
