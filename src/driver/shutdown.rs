//! Process signal handling.
//!
//! [`ShutdownController`] owns the OS signal registrations for as long as it
//! lives and exposes a cancellation token the rest of the relay watches.
//!
//! ## Unix
//! SIGINT (Ctrl-C), SIGTERM and SIGQUIT are handled.
//!
//! ## Windows
//! Only [`tokio::signal::ctrl_c`] is awaited.

use tokio_util::sync::CancellationToken;

pub struct ShutdownController {
    token: CancellationToken,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigquit: tokio::signal::unix::Signal,
}

impl ShutdownController {
    /// Registers the signal handlers. Must be called inside a runtime.
    pub fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            Ok(Self {
                token: CancellationToken::new(),
                sigterm: signal(SignalKind::terminate())?,
                sigquit: signal(SignalKind::quit())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {
                token: CancellationToken::new(),
            })
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Completes when the next termination signal arrives.
    #[cfg(unix)]
    pub async fn next_signal(&mut self) {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = self.sigterm.recv() => {},
            _ = self.sigquit.recv() => {},
        }
    }

    #[cfg(not(unix))]
    pub async fn next_signal(&mut self) {
        let _ = tokio::signal::ctrl_c().await;
    }
}
