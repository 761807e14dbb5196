//! Standalone sync daemon.
//!
//! Configuration comes from the environment:
//! - `HABITAT_BIND_ADDR` — listen address (default `127.0.0.1:9098`)
//! - `HABITAT_DATA_DIR`  — RocksDB directory; unset means in-memory rooms
//! - `RUST_LOG`          — log filtering, e.g. `habitat_sync=debug`

use habitat_sync::{ServerConfig, SyncServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut config = ServerConfig::default();
    if let Ok(addr) = std::env::var("HABITAT_BIND_ADDR") {
        config.bind_addr = addr;
    }
    if let Ok(dir) = std::env::var("HABITAT_DATA_DIR") {
        config.storage_path = Some(dir.into());
    }

    match &config.storage_path {
        Some(path) => log::info!("persisting rooms to {}", path.display()),
        None => log::warn!("HABITAT_DATA_DIR not set, rooms are in-memory only"),
    }

    let server = SyncServer::new(config)?;
    server.run().await
}
