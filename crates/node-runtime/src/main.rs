//! # dforum Node
//!
//! Entry point of a dforum peer.
//!
//! ## Startup Sequence
//!
//! 1. Load `dforum.toml` from the working directory (created if missing)
//! 2. Install logging
//! 3. Open the node store (fatal on failure)
//! 4. Wire storage, gossip and the TCP network
//! 5. Bootstrap onto the network and sync with a random peer
//! 6. Run until Ctrl+C, then save peers and close everything

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use node_runtime::container::config::CONFIG_FILE_NAME;
use node_runtime::container::subsystems::open_database;
use node_runtime::{logging, ConfigStore, NodeContainer, NodeRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    let store = Arc::new(
        ConfigStore::load_or_create(CONFIG_FILE_NAME).context("failed to load configuration")?,
    );
    let config = store.snapshot().with_env_overrides();

    logging::init_logging(&config.logging)?;
    info!(config = %store.path().display(), "starting dforum node");

    let database = open_database(&config)?;
    let container = Arc::new(NodeContainer::build(config, database).await?);
    let runtime = NodeRuntime::new(container, store);
    runtime.start().await;

    info!("node is running, press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    runtime.shutdown().await
}
