//! # Block abstractions and the factory registry.
//!
//! This module provides the block-related types:
//! - [`BlockDescriptor`] - `(name, responsibility)` identity of one running block
//! - [`Block`] - bundle of lifecycle callbacks, assembled through chained setters
//! - [`BlockFactories`] - name → factory registry consulted by the orchestrator
//!
//! Block lifecycle as seen by one block:
//! ```text
//! init(conf) ──► run(communicator) ──► [on_connect | on_message* | on_disconnect]* ──► finish(false)
//!     │
//!     └─ a later block failed init ──► finish(true)
//! ```
//! After `run` starts, callbacks arrive on independent tasks in no guaranteed order,
//! except that `on_message` calls never overlap and keep submission order.

mod block;
mod descriptor;
mod registry;

pub use block::Block;
pub(crate) use block::{BlockCallbacks, MessageFn};
pub use descriptor::{
    BlockDescriptor, CONNECTOR_NAME, CONNECTOR_RESPONSIBILITY, FINISHER_NAME,
    FINISHER_RESPONSIBILITY, INITIATOR_RESPONSIBILITY,
};
pub use registry::{BlockFactories, BlockFactory, default_factories, register_block_factory};
