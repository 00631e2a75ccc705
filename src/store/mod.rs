//! Location update model and the record store interface.
//!
//! The store is an external collaborator; the hub only needs to insert
//! records and read back the active ones.

pub mod types;
pub mod validate;

pub use types::*;

use std::sync::Arc;

use crate::error::StoreError;

/// Persistence consumed by ingestion and queries.
///
/// Implementations provide their own atomicity per single insert or query.
pub trait LocationStore: Send + Sync {
    /// Persists one new record.
    fn insert(&self, record: &LocationUpdate) -> Result<(), StoreError>;

    /// Returns every record with `active = true`, in the store's natural order.
    fn find_active(&self) -> Result<Vec<LocationUpdate>, StoreError>;
}

/// Runs a blocking store call off the async runtime.
pub async fn run_blocking<T, F>(store: Arc<dyn LocationStore>, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&dyn LocationStore) -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
}
