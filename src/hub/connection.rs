//! Observer connections.
//!
//! The hub never touches sockets directly. Each observer is a boxed
//! [`ObserverSink`] wrapped in an [`ObserverConnection`], which serializes
//! writes and applies the per-write timeout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::TransportError;

/// Outbound half of one observer's duplex message stream.
#[async_trait]
pub trait ObserverSink: Send + 'static {
    /// Writes one text frame.
    async fn send(&mut self, frame: &str) -> Result<(), TransportError>;

    /// Closes the stream. Further sends are expected to fail.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A registered observer.
pub struct ObserverConnection {
    sink: Mutex<Box<dyn ObserverSink>>,
    connected_at: DateTime<Utc>,
}

impl ObserverConnection {
    pub fn new(sink: impl ObserverSink) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
            connected_at: Utc::now(),
        }
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Writes one frame, giving up after `timeout`.
    pub async fn send(&self, frame: &str, timeout: Duration) -> Result<(), TransportError> {
        let write = async {
            let mut sink = self.sink.lock().await;
            sink.send(frame).await
        };
        match tokio::time::timeout(timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    /// Closes the underlying stream. Errors are logged, not returned.
    pub async fn close(&self, timeout: Duration) {
        let close = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(timeout, close).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Observer close failed"),
            Err(_) => tracing::debug!(?timeout, "Observer close timed out"),
        }
    }
}

impl std::fmt::Debug for ObserverConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverConnection")
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}
