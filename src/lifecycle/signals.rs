//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGTERM, SIGINT and SIGHUP
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers an API config reload, not shutdown
//! - Platforms without SIGHUP only get Ctrl+C

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// What a received signal asks the process to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Shutdown,
    Reload,
}

/// Forward signals until a shutdown signal arrives.
///
/// Reload requests go to `reload_tx`; shutdown triggers `shutdown`.
pub fn spawn_signal_handler(shutdown: Shutdown, reload_tx: mpsc::UnboundedSender<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut signals = match Signals::new() {
            Ok(signals) => signals,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handlers");
                return;
            }
        };
        loop {
            match signals.next().await {
                Ok(SignalEvent::Reload) => {
                    tracing::info!("SIGHUP received, reloading API config");
                    if reload_tx.send(()).is_err() {
                        tracing::debug!("Reload receiver dropped");
                    }
                }
                Ok(SignalEvent::Shutdown) => {
                    tracing::info!("Shutdown signal received");
                    shutdown.trigger();
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Signal handler failed");
                    return;
                }
            }
        }
    })
}

#[cfg(unix)]
struct Signals {
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    async fn next(&mut self) -> std::io::Result<SignalEvent> {
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|_| SignalEvent::Shutdown),
            _ = self.terminate.recv() => Ok(SignalEvent::Shutdown),
            _ = self.hangup.recv() => Ok(SignalEvent::Reload),
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> std::io::Result<SignalEvent> {
        tokio::signal::ctrl_c().await.map(|_| SignalEvent::Shutdown)
    }
}
