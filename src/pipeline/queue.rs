//! Bounded work queue between discovery and the worker pool.
//!
//! Ownership of each `WorkItem` transfers by value through the channel, so
//! there is no shared mutable payload state to lock. Closing the sending side
//! is the shutdown signal: once the queue is closed and drained, `dequeue`
//! returns `None` and workers exit.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use crate::data_model::WorkItem;

/// Creates a bounded work queue with the given capacity.
pub fn work_queue(capacity: usize) -> (WorkQueue, WorkSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        WorkQueue { tx },
        WorkSource {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer handle. Dropping the last clone closes the queue.
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::Sender<WorkItem>,
}

impl WorkQueue {
    /// Non-blocking enqueue. Returns false when the queue is full
    /// (backpressure) or already closed.
    pub fn try_enqueue(&self, item: WorkItem) -> bool {
        self.tx.try_send(item).is_ok()
    }

    /// Blocking enqueue: waits for capacity rather than growing unboundedly.
    /// Returns false only when the queue has been closed.
    pub async fn enqueue(&self, item: WorkItem) -> bool {
        self.tx.send(item).await.is_ok()
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Shared consumer handle for the worker pool.
#[derive(Clone)]
pub struct WorkSource {
    rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
}

impl WorkSource {
    /// Blocks until an item is available or the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<WorkItem> {
        self.rx.lock().await.recv().await
    }
}
