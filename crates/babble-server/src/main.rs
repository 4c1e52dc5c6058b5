//! babble TCP server.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use babble_server::config::{Cli, Config};
use babble_server::server;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli)?;

    tracing::info!(
        "Starting babble-server on {} (max_clients = {}, workers = {}, queues = {} x {})",
        config.socket_addr_string(),
        config.max_clients,
        config.worker_count,
        config.queue_count,
        config.queue_capacity
    );

    server::run(config).await
}
