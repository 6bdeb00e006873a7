//! # Unbounded FIFO queue with explicit cancellation.
//!
//! [`Queue`] is a thin wrapper over [`tokio::sync::mpsc::unbounded_channel`]; cancelling
//! drops the only sender. It backs the orchestrator's private message queue and every
//! block's mailbox, and doubles as an observation queue in tests.
//!
//! ## Rules
//! - **Non-blocking put**: `put()` never waits; it returns `false` once the queue is cancelled.
//! - **Reject-new, permit-drain**: after `cancel()`, `get()` still hands out items that were
//!   already queued, then returns `None`.
//! - **Single logical consumer**: concurrent `get()` calls are serialized internally.
//!
//! ```text
//! put ──► [ m1 | m2 | m3 ] ──► get
//!                 ▲
//!   cancel() ─────┘  (no new items; m1..m3 still drained)
//! ```

use std::sync::{Mutex as SyncMutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex, mpsc};

/// Unbounded, cancellable FIFO.
///
/// The sender lives behind a lock and is dropped by `cancel()`, so accepting an item and
/// cancelling never interleave: every accepted item is handed out by `get()`.
#[derive(Debug)]
pub struct Queue<T> {
    tx: SyncMutex<Option<mpsc::UnboundedSender<T>>>,
    rx: Mutex<mpsc::UnboundedReceiver<T>>,
}

impl<T: Send> Queue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: SyncMutex::new(Some(tx)),
            rx: Mutex::new(rx),
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<T>>> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an item.
    ///
    /// Returns `false` if the queue was cancelled (the item is dropped).
    pub fn put(&self, item: T) -> bool {
        match self.sender().as_ref() {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }

    /// Takes the next item, waiting for one if the queue is empty.
    ///
    /// Returns `None` once the queue is cancelled and drained.
    pub async fn get(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Takes the next item without waiting.
    ///
    /// Returns `None` if the queue is empty or another consumer currently holds it.
    pub fn try_get(&self) -> Option<T> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }

    /// Stops accepting new items and wakes a waiting consumer.
    pub fn cancel(&self) {
        self.sender().take();
    }

    /// True once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.sender().is_none()
    }
}

impl<T: Send> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
