//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Builds the shared state: directory, dispatcher, command queues.
//! - Spawns the fixed worker pool.
//! - Accepts new TCP connections and assigns each a `ConnectionId`.
//! - Spawns one task per connection (see `client`).
//! - On shutdown, stops accepting, closes the queues and waits for the
//!   workers to drain them. Open connections are abandoned.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{self, ConnectionContext};
use crate::config::Config;
use crate::directory::Directory;
use crate::dispatch::Dispatcher;
use crate::queue::QueueSet;
use crate::types::ConnectionId;
use crate::worker::WorkerPool;

/// Counter for assigning unique `ConnectionId`s.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// The running command-processing engine.
#[derive(Debug)]
pub struct Server {
    ctx: Arc<ConnectionContext>,
    workers: WorkerPool,
}

impl Server {
    /// Build the shared state and start the worker pool.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn initialize(config: &Config) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;

        let directory = Arc::new(Directory::new(config.max_clients));
        let dispatcher = Arc::new(Dispatcher::new(directory, config));
        let queues = Arc::new(QueueSet::new(config.queue_count, config.queue_capacity));
        let workers = WorkerPool::spawn(config.worker_count, &queues, Arc::clone(&dispatcher));

        let ctx = Arc::new(ConnectionContext {
            dispatcher,
            queues,
            max_frame_len: config.max_frame_len,
        });
        Ok(Server { ctx, workers })
    }

    pub fn directory(&self) -> &Arc<Directory> {
        self.ctx.dispatcher.directory()
    }

    /// Hand a freshly accepted connection to its own task.
    pub fn on_client_accepted(&self, stream: TcpStream, peer: SocketAddr) -> JoinHandle<()> {
        let conn_id = next_connection_id();
        debug!(conn = conn_id.0, %peer, "accepted connection");

        if let Err(e) = stream.set_nodelay(true) {
            debug!(conn = conn_id.0, "set_nodelay failed: {}", e);
        }

        let ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            if let Err(e) = client::run_client(conn_id, peer, stream, ctx).await {
                warn!(conn = conn_id.0, "client error: {:?}", e);
            }
        })
    }

    /// Close every queue and wait for the workers to drain them.
    pub async fn shutdown(self) {
        self.ctx.queues.close_all();
        self.workers.join().await;
        info!("all workers stopped");
    }
}

/// Run the TCP server with the given configuration until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    info!("Babble server bound to {}", addr);

    serve(listener, config, shutdown_signal()).await
}

/// Accept connections on `listener` until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, config: Config, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let server = Server::initialize(&config)?;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested, no longer accepting");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = accepted.context("accept failed")?;
                server.on_client_accepted(stream, peer);
            }
        }
    }

    server.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
