//! Driver
//!
//! Wires the ingestion loop, the hub and the WebSocket server together and
//! owns shutdown. The first interrupt starts a graceful stop: accepting
//! stops, subscribers are sent a close frame, the loop and the connections
//! are cancelled, and connection tasks get `shutdown_grace` to finish. A second interrupt
//! exits the process on the spot.

pub mod shutdown;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::buffer::RollingBuffer;
use crate::config::Settings;
use crate::hub::{BroadcastHub, HubHandle};
use crate::ingest::{ConsoleSink, IngestOptions, IngestReport, IngestionLoop, SourceFactory};
use crate::render::Renderer;
use crate::transport::{ServerOptions, bind, serve};
use crate::utils::error::RelayError;

pub use shutdown::ShutdownController;

/// Close reason sent to subscribers on a graceful stop.
pub const SHUTDOWN_REASON: &str = "relay shutting down";

/// Exit status used when a second interrupt forces termination.
pub const FORCED_EXIT_CODE: i32 = 130;

pub struct Relay {
    settings: Settings,
    factory: Arc<dyn SourceFactory>,
    console: Option<Box<dyn ConsoleSink>>,
}

impl Relay {
    pub fn new(settings: Settings, factory: Arc<dyn SourceFactory>) -> Self {
        Self {
            settings,
            factory,
            console: None,
        }
    }

    pub fn with_console(mut self, console: Box<dyn ConsoleSink>) -> Self {
        self.console = Some(console);
        self
    }

    /// Binds the configured address and runs until an OS signal arrives.
    pub async fn run(self) -> Result<Option<IngestReport>, RelayError> {
        let mut controller = ShutdownController::install()?;
        let listener = bind(&self.settings.listen_addr()).await?;
        let stop = controller.token();

        tokio::spawn(async move {
            controller.next_signal().await;
            info!("Shutdown signal received. Stopping gracefully.");
            controller.trigger();

            controller.next_signal().await;
            warn!("Second signal received. Exiting immediately.");
            std::process::exit(FORCED_EXIT_CODE);
        });

        self.serve(listener, stop).await
    }

    /// Runs on an already bound listener until `stop` is cancelled.
    ///
    /// Returns the ingestion report, or `None` if the loop did not stop
    /// within the grace period.
    pub async fn serve(
        self,
        listener: TcpListener,
        stop: CancellationToken,
    ) -> Result<Option<IngestReport>, RelayError> {
        let settings = self.settings;
        let renderer = Renderer::new(
            settings.wrap_width(),
            settings.separator_char(),
            settings.buffer.separator_len,
        );
        let options = IngestOptions {
            capacity: settings.capacity(),
            max_lines: settings.buffer.max_lines,
            retry_wait: settings.retry_wait(),
            stale_timeout: settings.stale_timeout(),
            poll_interval: settings.poll_interval(),
        };

        let initial = renderer.render(&RollingBuffer::new(options.capacity), true, options.max_lines);
        let hub = HubHandle::new(BroadcastHub::new(self.factory.source_url(), initial));

        let stop_accepting = CancellationToken::new();
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        let server = tokio::spawn(serve(
            listener,
            hub.clone(),
            ServerOptions {
                subscriber_queue: settings.server.subscriber_queue,
                send_timeout: settings.send_timeout(),
            },
            stop_accepting.clone(),
            shutdown.clone(),
            tracker.clone(),
        ));

        let mut ingestion =
            IngestionLoop::new(self.factory, renderer, hub.clone(), options, shutdown.clone());
        if let Some(console) = self.console {
            ingestion = ingestion.with_console(console);
        }
        let ingest = tokio::spawn(ingestion.run());

        stop.cancelled().await;

        stop_accepting.cancel();
        let notified = hub.shutdown(SHUTDOWN_REASON);
        info!(notified, "closing subscriber connections");
        shutdown.cancel();
        tracker.close();

        let grace = settings.shutdown_grace();
        if timeout(grace, tracker.wait()).await.is_err() {
            warn!(?grace, "connections still open after grace period");
        }
        if let Err(e) = server.await {
            error!("server task failed: {e}");
        }

        match timeout(grace, ingest).await {
            Ok(Ok(report)) => Ok(Some(report)),
            Ok(Err(e)) => {
                error!("ingestion task failed: {e}");
                Ok(None)
            }
            Err(_) => {
                warn!(?grace, "ingestion loop did not stop within grace period");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests;
