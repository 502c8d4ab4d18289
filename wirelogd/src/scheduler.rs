// Polling loop

//! Fixed-cadence polling loop
//!
//! Each cycle reads a snapshot of every peer, feeds it to the
//! [`ActivityMonitor`] and hands the resulting transitions to an
//! [`EventSink`]. The shutdown future is only checked while sleeping between
//! cycles, so a poll in progress always completes.

use crate::monitor::ActivityMonitor;
use crate::snapshot::{unix_now, SnapshotSource};
use crate::types::TransitionEvent;
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};

/// Receiver of peer transitions
pub trait EventSink {
    /// Record one transition; an error stops the daemon
    fn emit(&mut self, event: &TransitionEvent) -> Result<()>;
}

/// Poll `source` every `refresh` until `shutdown` resolves
///
/// Returns an error as soon as a snapshot or a sink write fails; the batch
/// in progress is abandoned.
pub async fn run<S, K, F>(
    source: &S,
    monitor: &mut ActivityMonitor,
    sink: &mut K,
    refresh: Duration,
    shutdown: F,
) -> Result<()>
where
    S: SnapshotSource,
    K: EventSink,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let peers = source
            .current_snapshots()
            .await
            .context("Failed to read WireGuard peers")?;

        if log::log_enabled!(log::Level::Debug) {
            let dump = serde_json::to_string(&peers).context("Failed to serialize peers")?;
            log::debug!(count = peers.len(), peers = dump.as_str(); "polled peers");
        }

        for event in monitor.observe(&peers, unix_now()) {
            sink.emit(&event).context("Failed to log peer transition")?;
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => return Ok(()),
            _ = tokio::time::sleep(refresh) => {}
        }
    }
}

/// Resolves on the first SIGTERM or SIGINT
///
/// Handlers are installed before returning so that a signal received while a
/// poll is running is not lost.
pub fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to set up SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to set up SIGINT handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => log::info!("Received SIGTERM"),
            _ = sigint.recv() => log::info!("Received SIGINT"),
        }
    })
}
