//! In-memory observer sinks for tests.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::connection::ObserverSink;
use crate::error::TransportError;
use crate::store::{Coordinate, CrowdLevel, LocationUpdate};

pub fn sample_update(user_id: &str) -> LocationUpdate {
    LocationUpdate {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        route: "R12".to_string(),
        coordinates: vec![Coordinate::new(12.9, 77.6)],
        crowd: Some(CrowdLevel::Medium),
        start_point: "A".to_string(),
        destination: "B".to_string(),
        active: true,
        timestamp: Utc::now(),
    }
}

/// Forwards frames to a channel. Fails once closed or once the receiver is gone.
pub struct ChannelSink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }
}

#[async_trait]
impl ObserverSink for ChannelSink {
    async fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        match &self.tx {
            Some(tx) => tx
                .send(frame.to_string())
                .map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

/// Every write fails, as with a peer that vanished.
pub struct FailingSink {
    closed: Arc<AtomicBool>,
}

impl FailingSink {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        (
            Self {
                closed: Arc::clone(&closed),
            },
            closed,
        )
    }
}

#[async_trait]
impl ObserverSink for FailingSink {
    async fn send(&mut self, _frame: &str) -> Result<(), TransportError> {
        Err(TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Writes never complete.
pub struct StallingSink;

#[async_trait]
impl ObserverSink for StallingSink {
    async fn send(&mut self, _frame: &str) -> Result<(), TransportError> {
        futures::future::pending().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Accepts and discards everything.
pub struct NullSink;

#[async_trait]
impl ObserverSink for NullSink {
    async fn send(&mut self, _frame: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Takes a while to close, then records that it did.
pub struct SlowCloseSink {
    pub delay: std::time::Duration,
    pub closed: Arc<AtomicBool>,
}

#[async_trait]
impl ObserverSink for SlowCloseSink {
    async fn send(&mut self, _frame: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        tokio::time::sleep(self.delay).await;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
