//! Shared application state for the HTTP server.
//!
//! Holds the ingestion and query operations so handlers stay thin.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{QueryError, ShareError};
use crate::hub::Hub;
use crate::store::{run_blocking, LocationStore, LocationUpdate, MonotonicClock, SharePayload};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn LocationStore>,
    hub: Hub,
    clock: Arc<MonotonicClock>,
    /// Serializes timestamp assignment, insert and enqueue across shares.
    ingest: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: Arc<dyn LocationStore>, hub: Hub) -> Self {
        Self {
            store,
            hub,
            clock: Arc::new(MonotonicClock::new()),
            ingest: Arc::new(Mutex::new(())),
        }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Validates, persists and then broadcasts one update.
    ///
    /// Nothing is broadcast unless the insert succeeded. Concurrent shares
    /// are inserted and enqueued in timestamp order.
    pub async fn share(&self, payload: SharePayload) -> Result<LocationUpdate, ShareError> {
        let id = uuid::Uuid::new_v4().to_string();
        let _ingest = self.ingest.lock().await;
        let update = payload.validate(id, self.clock.now())?;

        let record = update.clone();
        run_blocking(Arc::clone(&self.store), move |store| store.insert(&record))
            .await
            .map_err(|e| {
                tracing::error!(update = %update.id, error = %e, "Failed to persist update");
                ShareError::Persistence(e)
            })?;

        self.hub
            .publish(update.clone())
            .map_err(|source| ShareError::NotBroadcast {
                id: update.id.clone(),
                source,
            })?;

        tracing::info!(
            update = %update.id,
            user = %update.user_id,
            route = %update.route,
            points = update.coordinates.len(),
            "Update shared"
        );
        Ok(update)
    }

    /// Reads all active records.
    pub async fn onboard(&self) -> Result<Vec<LocationUpdate>, QueryError> {
        run_blocking(Arc::clone(&self.store), |store| store.find_active())
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to fetch active updates");
                QueryError::StoreUnavailable(e)
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::database::Database;
    use crate::error::{StoreError, ValidationError};
    use crate::hub::testing::ChannelSink;
    use crate::hub::HubConfig;
    use crate::store::{Coordinate, CrowdLevel};
    use std::time::Duration;

    /// A store whose backend is unreachable.
    pub struct DownStore;

    impl LocationStore for DownStore {
        fn insert(&self, _record: &LocationUpdate) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn find_active(&self) -> Result<Vec<LocationUpdate>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    pub fn scenario_payload() -> SharePayload {
        SharePayload {
            user_id: Some("u1".to_string()),
            route: Some("R12".to_string()),
            coordinates: vec![Coordinate::new(12.9, 77.6)],
            crowd: Some("medium".to_string()),
            start_point: Some("A".to_string()),
            destination: Some("B".to_string()),
        }
    }

    fn hub() -> Hub {
        Hub::spawn(HubConfig {
            write_timeout: Duration::from_millis(200),
        })
    }

    fn observer(state: &AppState) -> tokio::sync::mpsc::UnboundedReceiver<String> {
        let (sink, rx) = ChannelSink::new();
        state
            .hub()
            .registry()
            .register(crate::hub::ObserverConnection::new(sink));
        rx
    }

    #[tokio::test]
    async fn test_share_persists_then_broadcasts() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let state = AppState::new(db.clone(), hub());
        let mut rx = observer(&state);

        let shared = state.share(scenario_payload()).await.unwrap();

        assert!(shared.active);
        assert_eq!(shared.crowd, Some(CrowdLevel::Medium));
        assert_eq!(db.count().unwrap(), 1);
        assert_eq!(db.find_active().unwrap(), vec![shared.clone()]);

        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let received: LocationUpdate = serde_json::from_str(&frame).unwrap();
        assert_eq!(received, shared);
    }

    #[tokio::test]
    async fn test_share_missing_user_id_has_no_side_effects() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let state = AppState::new(db.clone(), hub());
        let mut rx = observer(&state);

        let mut payload = scenario_payload();
        payload.user_id = None;
        let err = state.share(payload).await.unwrap_err();

        assert!(matches!(
            err,
            ShareError::Validation(ValidationError::MissingField("user_id"))
        ));
        assert_eq!(db.count().unwrap(), 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(state.hub().stats().rounds, 0);
    }

    #[tokio::test]
    async fn test_share_not_broadcast_when_store_down() {
        let state = AppState::new(Arc::new(DownStore), hub());
        let mut rx = observer(&state);

        let err = state.share(scenario_payload()).await.unwrap_err();

        assert!(matches!(err, ShareError::Persistence(_)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_share_after_hub_shutdown_still_persists() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let state = AppState::new(db.clone(), hub());
        state.hub().shutdown().await;

        let err = state.share(scenario_payload()).await.unwrap_err();

        assert!(matches!(err, ShareError::NotBroadcast { .. }));
        assert_eq!(db.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_share_timestamps_non_decreasing() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let state = AppState::new(db, hub());

        let mut last = None;
        for _ in 0..10 {
            let shared = state.share(scenario_payload()).await.unwrap();
            if let Some(previous) = last {
                assert!(shared.timestamp >= previous);
            }
            last = Some(shared.timestamp);
        }
    }

    /// Stalls the first insert so a later share can overtake it.
    struct SlowFirstInsert {
        inner: Database,
        stalled: std::sync::atomic::AtomicBool,
    }

    impl LocationStore for SlowFirstInsert {
        fn insert(&self, record: &LocationUpdate) -> Result<(), StoreError> {
            if !self.stalled.swap(true, std::sync::atomic::Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(200));
            }
            self.inner.insert(record)
        }

        fn find_active(&self) -> Result<Vec<LocationUpdate>, StoreError> {
            self.inner.find_active()
        }
    }

    #[tokio::test]
    async fn test_concurrent_shares_insert_in_timestamp_order() {
        let store = Arc::new(SlowFirstInsert {
            inner: Database::open_in_memory().unwrap(),
            stalled: std::sync::atomic::AtomicBool::new(false),
        });
        let state = AppState::new(store.clone(), hub());
        let mut rx = observer(&state);

        let first = {
            let state = state.clone();
            tokio::spawn(async move { state.share(scenario_payload()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = state.share(scenario_payload()).await.unwrap();
        let first = first.await.unwrap().unwrap();

        let stored = store.find_active().unwrap();
        assert_eq!(stored.len(), 2);
        assert!(
            stored[0].timestamp <= stored[1].timestamp,
            "timestamp decreased across inserts"
        );
        assert_eq!(stored, vec![first.clone(), second.clone()]);

        // Broadcast order follows insert order
        for expected in [first, second] {
            let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            let received: LocationUpdate = serde_json::from_str(&frame).unwrap();
            assert_eq!(received, expected);
        }
    }

    #[tokio::test]
    async fn test_onboard_returns_shared_records() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let state = AppState::new(db, hub());
        let a = state.share(scenario_payload()).await.unwrap();
        let b = state.share(scenario_payload()).await.unwrap();

        assert_eq!(state.onboard().await.unwrap(), vec![a, b]);
    }

    #[tokio::test]
    async fn test_onboard_store_down() {
        let state = AppState::new(Arc::new(DownStore), hub());
        assert!(matches!(
            state.onboard().await,
            Err(QueryError::StoreUnavailable(_))
        ));
    }
}
