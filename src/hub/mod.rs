//! Real-time broadcast hub.
//!
//! Fans each published location update out to every connected observer and
//! keeps the observer set correct while connections come and go.
//!
//! # Architecture
//!
//! ```text
//!   POST /share ──► Hub::publish ──► mpsc queue ──► Dispatcher
//!                                                     │ snapshot()
//!                                                     ▼
//!   GET /ws ──► Hub::observe ──► ObserverRegistry ◄── prune on write failure
//!               (register, drain inbound, deregister + close)
//! ```
//!
//! A [`Hub`] is an explicit object with a constructor ([`Hub::spawn`]) and a
//! shutdown path ([`Hub::shutdown`]). Clones share the same dispatcher and
//! registry.

pub mod connection;
pub mod dispatcher;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{ObserverConnection, ObserverSink};
pub use dispatcher::RoundOutcome;
pub use registry::{ObserverId, ObserverRegistry};

use futures::{Stream, StreamExt};
use serde::Serialize;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch, OnceCell};
use tokio::task::JoinHandle;

use crate::error::HubError;
use crate::store::LocationUpdate;
use dispatcher::{DispatchCounters, Dispatcher};

/// Default bound on a single observer write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Hub tuning.
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// A write taking longer than this drops the observer.
    pub write_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// Point-in-time hub counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub observers: usize,
    pub rounds: u64,
    pub delivered: u64,
    pub pruned: u64,
}

struct HubInner {
    registry: Arc<ObserverRegistry>,
    queue: mpsc::UnboundedSender<LocationUpdate>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
    stopped: OnceCell<()>,
    task: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<DispatchCounters>,
    config: HubConfig,
}

/// Handle to the broadcast hub.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Hub {
    /// Creates a hub and starts its dispatcher on the current Tokio runtime.
    pub fn spawn(config: HubConfig) -> Self {
        let registry = Arc::new(ObserverRegistry::new());
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(DispatchCounters::default());

        let dispatcher = Dispatcher {
            registry: Arc::clone(&registry),
            queue: queue_rx,
            shutdown: shutdown_rx,
            write_timeout: config.write_timeout,
            counters: Arc::clone(&counters),
        };
        let task = tokio::spawn(dispatcher.run());

        tracing::info!(write_timeout = ?config.write_timeout, "Broadcast hub started");

        Self {
            inner: Arc::new(HubInner {
                registry,
                queue: queue_tx,
                shutdown: shutdown_tx,
                closed: AtomicBool::new(false),
                stopped: OnceCell::new(),
                task: Mutex::new(Some(task)),
                counters,
                config,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<ObserverRegistry> {
        &self.inner.registry
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Queues an update for broadcast. Never blocks.
    pub fn publish(&self, update: LocationUpdate) -> Result<(), HubError> {
        if self.is_closed() {
            return Err(HubError::Closed);
        }
        self.inner.queue.send(update).map_err(|_| HubError::Closed)
    }

    /// Serves one observer for the lifetime of its connection.
    ///
    /// Registers `sink`, then drains `inbound` until it ends or yields an
    /// error. Inbound items are ignored; observers are receive-only. On exit
    /// the observer is deregistered and closed, unless the dispatcher already
    /// did so after a failed write. On a shut-down hub the sink is closed
    /// straight away.
    pub async fn observe<S, T, E>(&self, sink: impl ObserverSink, inbound: S) -> ObserverId
    where
        S: Stream<Item = Result<T, E>>,
        E: Display,
    {
        let timeout = self.inner.config.write_timeout;
        let id = self.inner.registry.register(ObserverConnection::new(sink));

        // shutdown() sets `closed` before draining, so a registration that
        // missed the drain sees it here
        if self.is_closed() {
            if let Some(conn) = self.inner.registry.deregister(id) {
                conn.close(timeout).await;
            }
            tracing::debug!(observer = %id, "Observer rejected, hub is shut down");
            return id;
        }
        tracing::info!(observer = %id, "Observer connected");

        let mut inbound = std::pin::pin!(inbound);
        let mut ignored = 0u64;
        while let Some(item) = inbound.next().await {
            match item {
                Ok(_) => ignored += 1,
                Err(e) => {
                    tracing::debug!(observer = %id, error = %e, "Observer stream error");
                    break;
                }
            }
        }

        match self.inner.registry.deregister(id) {
            Some(conn) => {
                let connected_secs = (chrono::Utc::now() - conn.connected_at()).num_seconds();
                conn.close(timeout).await;
                tracing::info!(observer = %id, ignored, connected_secs, "Observer disconnected");
            }
            // Already pruned by the dispatcher or drained by shutdown
            None => tracing::info!(observer = %id, ignored, "Observer disconnected"),
        }
        id
    }

    pub fn stats(&self) -> HubStats {
        let counters = &self.inner.counters;
        HubStats {
            observers: self.inner.registry.len(),
            rounds: counters.rounds.load(Ordering::Relaxed),
            delivered: counters.delivered.load(Ordering::Relaxed),
            pruned: counters.pruned.load(Ordering::Relaxed),
        }
    }

    /// Stops the hub.
    ///
    /// New publishes fail immediately. Updates already queued are still
    /// delivered, then every remaining observer is closed. Safe to call more
    /// than once; every caller returns only after the first has finished.
    pub async fn shutdown(&self) {
        self.inner.stopped.get_or_init(|| self.stop()).await;
    }

    async fn stop(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        tracing::info!("Broadcast hub shutting down");

        let _ = self.inner.shutdown.send(true);
        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Dispatcher task failed");
            }
        }

        let remaining = self.inner.registry.drain();
        let count = remaining.len();
        let timeout = self.inner.config.write_timeout;
        futures::future::join_all(remaining.iter().map(|(_, conn)| conn.close(timeout))).await;

        tracing::info!(closed_observers = count, "Broadcast hub stopped");
    }
}
