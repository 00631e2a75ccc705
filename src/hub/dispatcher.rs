//! Broadcast dispatcher.
//!
//! Single consumer of the update queue. Each update is serialized once and
//! written to a snapshot of the registry; the whole round completes before
//! the next update is pulled, which keeps per-observer delivery in FIFO order.

use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

use super::registry::ObserverRegistry;
use crate::store::LocationUpdate;

/// Counters exposed through [`super::Hub::stats`].
#[derive(Debug, Default)]
pub(crate) struct DispatchCounters {
    pub rounds: AtomicU64,
    pub delivered: AtomicU64,
    pub pruned: AtomicU64,
}

/// Result of one broadcast round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    pub delivered: usize,
    pub pruned: usize,
}

pub(crate) struct Dispatcher {
    pub registry: Arc<ObserverRegistry>,
    pub queue: mpsc::UnboundedReceiver<LocationUpdate>,
    pub shutdown: watch::Receiver<bool>,
    pub write_timeout: Duration,
    pub counters: Arc<DispatchCounters>,
}

impl Dispatcher {
    /// Runs until shutdown is signalled or every publisher is gone.
    ///
    /// Updates already queued when shutdown arrives are still delivered.
    pub async fn run(mut self) {
        tracing::debug!("Dispatcher started");

        loop {
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                next = self.queue.recv() => match next {
                    Some(update) => {
                        self.broadcast(&update).await;
                    }
                    None => {
                        tracing::debug!("Update queue closed");
                        return;
                    }
                },
            }
        }

        // Refuse new updates, flush what is already queued
        self.queue.close();
        let mut flushed = 0usize;
        while let Some(update) = self.queue.recv().await {
            self.broadcast(&update).await;
            flushed += 1;
        }
        tracing::debug!(flushed, "Dispatcher stopped");
    }

    /// Writes one update to every registered observer.
    pub async fn broadcast(&self, update: &LocationUpdate) -> RoundOutcome {
        let frame = match serde_json::to_string(update) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(update = %update.id, error = %e, "Failed to serialize update");
                return RoundOutcome::default();
            }
        };

        let snapshot = self.registry.snapshot();
        let timeout = self.write_timeout;
        let results = join_all(snapshot.iter().map(|(id, conn)| {
            let frame = frame.as_str();
            async move { (*id, conn.send(frame, timeout).await) }
        }))
        .await;

        let mut outcome = RoundOutcome::default();
        let mut failed = Vec::new();
        for (id, result) in results {
            match result {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    tracing::debug!(observer = %id, error = %e, "Dropping unreachable observer");
                    // The subscription task may have removed it already
                    if let Some(conn) = self.registry.deregister(id) {
                        failed.push(conn);
                    }
                }
            }
        }
        outcome.pruned = failed.len();
        join_all(failed.iter().map(|conn| conn.close(timeout))).await;

        self.counters.rounds.fetch_add(1, Ordering::Relaxed);
        self.counters
            .delivered
            .fetch_add(outcome.delivered as u64, Ordering::Relaxed);
        self.counters
            .pruned
            .fetch_add(outcome.pruned as u64, Ordering::Relaxed);

        tracing::debug!(
            update = %update.id,
            route = %update.route,
            delivered = outcome.delivered,
            pruned = outcome.pruned,
            "Update broadcast"
        );
        outcome
    }
}
