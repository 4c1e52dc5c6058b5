//! Bounded producer/consumer command queue.
//!
//! Classic two-semaphore ring: `free` counts empty slots, `filled`
//! counts queued items. A producer takes a free slot (waiting while the
//! queue is full), pushes, and releases one `filled` permit, waking one
//! consumer; a consumer does the mirror image. FIFO order is kept by
//! the `VecDeque`, and its length can never exceed `capacity` because
//! every push is paid for with a free slot.

use std::collections::VecDeque;
use std::sync::Arc;

use babble_core::ClientKey;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::dispatch::Job;

/// The queue was closed; the item was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("command queue is closed")]
pub struct QueueClosed;

#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    free: Semaphore,
    filled: Semaphore,
    capacity: usize,
}

pub type CommandQueue = BoundedQueue<Job>;

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        BoundedQueue {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            free: Semaphore::new(capacity),
            filled: Semaphore::new(0),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Append `item`, waiting while the queue is full.
    ///
    /// On a closed queue the item is dropped and `QueueClosed` returned.
    pub async fn enqueue(&self, item: T) -> Result<(), QueueClosed> {
        let slot = self.free.acquire().await.map_err(|_| QueueClosed)?;
        slot.forget();

        {
            // Checked under the items lock: a consumer that saw the queue
            // closed pops its last item under this same lock, so anything
            // pushed here is either refused or still drained.
            let mut items = self.items.lock();
            if self.is_closed() {
                return Err(QueueClosed);
            }
            items.push_back(item);
        }
        self.filled.add_permits(1);
        Ok(())
    }

    /// Remove the oldest item, waiting while the queue is empty.
    ///
    /// Once the queue is closed, remaining items are still handed out;
    /// `None` means closed and drained.
    pub async fn dequeue(&self) -> Option<T> {
        match self.filled.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => return self.items.lock().pop_front(),
        }

        let item = self.items.lock().pop_front();
        self.free.add_permits(1);
        item
    }

    /// Refuse new items and wake every blocked producer and consumer.
    pub fn close(&self) {
        let _items = self.items.lock();
        self.free.close();
        self.filled.close();
    }

    pub fn is_closed(&self) -> bool {
        self.free.is_closed()
    }
}

/// The set of command queues; a client is pinned to one of them so
/// its own commands stay in FIFO order.
#[derive(Debug)]
pub struct QueueSet {
    queues: Vec<Arc<CommandQueue>>,
}

impl QueueSet {
    pub fn new(count: usize, capacity: usize) -> Self {
        let queues = (0..count.max(1))
            .map(|_| Arc::new(CommandQueue::new(capacity)))
            .collect();
        QueueSet { queues }
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Queue serving commands issued by `key`.
    pub fn for_key(&self, key: ClientKey) -> &Arc<CommandQueue> {
        let idx = (key.0 % self.queues.len() as u64) as usize;
        &self.queues[idx]
    }

    /// Queue drained by worker number `worker`.
    pub fn for_worker(&self, worker: usize) -> &Arc<CommandQueue> {
        &self.queues[worker % self.queues.len()]
    }

    pub fn close_all(&self) {
        for q in &self.queues {
            q.close();
        }
    }
}
