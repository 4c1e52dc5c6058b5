//! Worker pool.
//!
//! A fixed number of worker tasks, each pinned to one command queue,
//! dequeue jobs and hand them to the [`Dispatcher`]. Workers stop once
//! their queue is closed and drained.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::dispatch::Dispatcher;
use crate::queue::{CommandQueue, QueueSet};

#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers; worker `i` drains `queues.for_worker(i)`.
    pub fn spawn(count: usize, queues: &QueueSet, dispatcher: Arc<Dispatcher>) -> Self {
        let handles = (0..count)
            .map(|id| {
                let queue = Arc::clone(queues.for_worker(id));
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(run_worker(id, queue, dispatcher))
            })
            .collect();
        WorkerPool { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to stop (queues must be closed first).
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("worker task failed: {}", e);
            }
        }
    }
}

/// Run one worker until its queue is closed and empty.
async fn run_worker(id: usize, queue: Arc<CommandQueue>, dispatcher: Arc<Dispatcher>) {
    info!(worker = id, "worker started");

    while let Some(job) = queue.dequeue().await {
        dispatcher.execute(job).await;
    }

    info!(worker = id, "worker stopping (queue closed)");
}
