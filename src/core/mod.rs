//! Runtime core: delivery, communicators and orchestration.
//!
//! The only public items are [`Communicator`] and [`Phase`]; everything else is driven
//! through the [`Runtime`](crate::Runtime) façade.
//!
//! Internal modules:
//! - `mailbox`: serialized, ordered `on_message` delivery for one block;
//! - `active`: the active set, built once and shared read-only;
//! - `communicator`: per-block controller (send, notify, finish, lookup);
//! - `orchestrator`: the `"initiator"` block, startup rollback and the main loop;
//! - `shutdown`: OS termination signals.

mod active;
mod communicator;
mod mailbox;
mod orchestrator;
mod shutdown;

pub use communicator::Communicator;
pub use orchestrator::Phase;

pub(crate) use orchestrator::{Blueprint, ConnectorSetup, Orchestrator};
pub(crate) use shutdown::wait_for_termination;
