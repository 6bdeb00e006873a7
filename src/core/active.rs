//! Active set: every block of one run, in activation order.
//!
//! Index 0 is always the orchestrator. The set is built once after successful
//! initialization and only read afterwards, so it is shared without locking.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle;
use tracing::error;

use crate::blocks::{BlockCallbacks, BlockDescriptor};
use crate::core::mailbox::Mailbox;

pub(crate) struct ActiveBlock {
    pub(crate) descriptor: BlockDescriptor,
    pub(crate) block: BlockCallbacks,
    /// Present iff the block has an `on_message` callback.
    pub(crate) mailbox: Option<Mailbox>,
}

impl ActiveBlock {
    pub(crate) fn new(descriptor: BlockDescriptor, block: BlockCallbacks) -> Self {
        let mailbox = block
            .on_message
            .clone()
            .map(|handler| Mailbox::new(descriptor.responsibility(), handler));
        Self {
            descriptor,
            block,
            mailbox,
        }
    }

    /// Awaits the block's `finish`; a panic inside it is logged and swallowed.
    pub(crate) async fn finish(&self, during_init: bool) {
        let finish = Arc::clone(&self.block.finish);
        if let Err(panic_err) = AssertUnwindSafe(async { finish(during_init).await })
            .catch_unwind()
            .await
        {
            error!(
                name = self.descriptor.name(),
                responsibility = self.descriptor.responsibility(),
                panic = ?panic_err,
                "finish panicked"
            );
        }
    }

    pub(crate) fn close_mailbox(&self) {
        if let Some(mailbox) = &self.mailbox {
            mailbox.cancel();
        }
    }
}

pub(crate) struct ActiveSet {
    blocks: Vec<ActiveBlock>,
    runtime: Handle,
}

impl ActiveSet {
    /// Must be called inside a tokio runtime; callbacks are later spawned onto it.
    pub(crate) fn new(blocks: Vec<ActiveBlock>) -> Self {
        Self {
            blocks,
            runtime: Handle::current(),
        }
    }

    /// Spawns callback work onto the runtime that built the set.
    pub(crate) fn spawn<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(work);
    }

    /// Entry at `index`; indices handed out by the set are always in range.
    pub(crate) fn at(&self, index: usize) -> &ActiveBlock {
        &self.blocks[index]
    }

    /// Linear lookup by responsibility.
    pub(crate) fn position(&self, responsibility: &str) -> Option<usize> {
        self.blocks
            .iter()
            .position(|b| b.descriptor.responsibility() == responsibility)
    }

    pub(crate) fn len(&self) -> usize {
        self.blocks.len()
    }
}
