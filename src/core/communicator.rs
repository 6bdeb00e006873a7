//! # Communicator: a block's handle to itself and to the other blocks.
//!
//! Every active block gets one [`Communicator`] as the argument of its `run` callback.
//! It is a cheap, cloneable view over the shared active set.
//!
//! | Operation                | Delivery                                                   |
//! |--------------------------|------------------------------------------------------------|
//! | [`send`]                 | serialized, FIFO per target (mailbox)                      |
//! | [`notify_connected`]     | fresh task per call, not ordered with messages             |
//! | [`notify_disconnected`]  | fresh task per call, not ordered with messages             |
//! | [`finish`]               | fresh task: `finish(false)`, close mailbox, report back    |
//!
//! None of these return errors: `false` means "not delivered" and is routine.
//!
//! [`send`]: Communicator::send
//! [`notify_connected`]: Communicator::notify_connected
//! [`notify_disconnected`]: Communicator::notify_disconnected
//! [`finish`]: Communicator::finish

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::blocks::BlockDescriptor;
use crate::core::active::{ActiveBlock, ActiveSet};
use crate::messages::Msg;
use crate::server::ServerConnection;

/// Per-block controller.
#[derive(Clone)]
pub struct Communicator {
    set: Arc<ActiveSet>,
    index: usize,
}

impl Communicator {
    pub(crate) fn new(set: Arc<ActiveSet>, index: usize) -> Self {
        Self { set, index }
    }

    fn entry(&self) -> &ActiveBlock {
        self.set.at(self.index)
    }

    /// Looks up the communicator of the block with `responsibility`.
    ///
    /// The orchestrator is reachable as
    /// [`INITIATOR_RESPONSIBILITY`](crate::INITIATOR_RESPONSIBILITY).
    pub fn communicator(&self, responsibility: &str) -> Option<Communicator> {
        self.set
            .position(responsibility)
            .map(|index| Communicator::new(Arc::clone(&self.set), index))
    }

    /// Identity of the block behind this communicator.
    pub fn descriptor(&self) -> &BlockDescriptor {
        &self.entry().descriptor
    }

    /// Queues `msg` for the block's `on_message`.
    ///
    /// Returns `false` if the block has no `on_message` callback or already finished.
    pub fn send(&self, msg: Msg) -> bool {
        match &self.entry().mailbox {
            Some(mailbox) => mailbox.submit(msg),
            None => false,
        }
    }

    /// Runs the block's `on_connect` on a new task.
    ///
    /// Returns `false` if the block has no such callback.
    pub fn notify_connected(&self, connection: ServerConnection) -> bool {
        let Some(on_connect) = self.entry().block.on_connect.clone() else {
            return false;
        };
        self.set.spawn(async move { on_connect(connection).await });
        true
    }

    /// Runs the block's `on_disconnect` on a new task.
    ///
    /// Returns `false` if the block has no such callback.
    pub fn notify_disconnected(&self) -> bool {
        let Some(on_disconnect) = self.entry().block.on_disconnect.clone() else {
            return false;
        };
        self.set.spawn(async move { on_disconnect().await });
        true
    }

    /// Finishes the block asynchronously.
    ///
    /// On a new task: awaits `finish(false)`, closes the block's mailbox and reports
    /// `__finished` to the orchestrator. On the orchestrator's own communicator this is a
    /// shutdown request for the whole process.
    pub fn finish(&self) {
        let me = self.clone();
        self.set.spawn(async move {
            let entry = me.entry();
            let responsibility = entry.descriptor.responsibility();
            debug!(responsibility, "finishing block");

            entry.finish(false).await;
            if me.index == 0 {
                return;
            }
            entry.close_mailbox();
            Communicator::new(Arc::clone(&me.set), 0).send(Msg::finished(responsibility));
        });
    }
}

impl fmt::Debug for Communicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Communicator")
            .field("descriptor", self.descriptor())
            .finish()
    }
}
