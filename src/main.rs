//! Transit Hub - live bus location sharing server.

use std::sync::Arc;

use tokio::sync::oneshot;
use transit_hub::config::{Config, DatabaseLocation};
use transit_hub::database::Database;
use transit_hub::hub::Hub;
use transit_hub::server::{run_server, state::AppState};
use transit_hub::store::LocationStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("transit_hub=info")),
        )
        .init();

    let config = Config::from_env()?;

    let db = match &config.database {
        DatabaseLocation::File(path) => Database::open(path)?,
        DatabaseLocation::Memory => {
            tracing::warn!("Using in-memory database, shared journeys will not survive a restart");
            Database::open_in_memory()?
        }
    };
    let store: Arc<dyn LocationStore> = Arc::new(db);

    let hub = Hub::spawn(config.hub());
    let state = AppState::new(store, hub.clone());

    // Ctrl+C starts the shutdown sequence
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut stop_tx = Some(stop_tx);
    ctrlc::set_handler(move || {
        if let Some(tx) = stop_tx.take() {
            tracing::info!("Shutdown signal received");
            let _ = tx.send(());
        }
    })?;

    // Close observers first so their sockets don't hold the server open
    let shutdown_hub = hub.clone();
    let shutdown = async move {
        let _ = stop_rx.await;
        shutdown_hub.shutdown().await;
    };

    run_server(config.bind_addr, state, shutdown).await?;

    hub.shutdown().await;
    tracing::info!("Transit Hub has exited");
    Ok(())
}
