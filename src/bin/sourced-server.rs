//! Event server: WebSocket ingest and fan-out over a redb file.

use std::error::Error;

use sourced_es::server::{Server, ServerConfig};
use sourced_es::EventStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(address = %config.address, storage = %config.storage_path.display(), "starting");

    // A store that cannot open is fatal.
    let store = EventStore::open(&config.storage_path)?;
    let listener = tokio::net::TcpListener::bind(&config.address).await?;

    Server::new(store)
        .serve(listener, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(%err, "listening for ctrl-c failed");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
