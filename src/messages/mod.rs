//! Messages exchanged between blocks and the queue they travel through.
//!
//! ## Contents
//! - [`Msg`], [`Value`] the schema-less envelope every block speaks
//! - [`Queue`] unbounded FIFO with explicit cancellation (reject-new, permit-drain)
//! - reserved key and message-name constants (the `__` prefix belongs to the runtime)
//!
//! ## Quick reference
//! - **Producers**: any block via [`Communicator::send`](crate::Communicator::send); the runtime
//!   itself for lifecycle messages (`__finish`, `__finished`, `__connected`, `__disconnected`).
//! - **Consumers**: a block's `on_message` callback (through its mailbox), and the orchestrator's
//!   main loop, which only ever looks at reserved keys.

mod msg;
mod queue;

pub use msg::{
    CONNECTION_KEY, CONNECTOR_KEY, FINISH_MSG, FINISHED_MSG, Msg, NAME_KEY, RESERVED_PREFIX,
    RESP_KEY, SERVER_CONNECTED_MSG, SERVER_DISCONNECTED_MSG, SETUP_MSG, TIMEOUT_KEY, Value,
};
pub use queue::Queue;
