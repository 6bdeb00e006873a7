//! Built-in blocks.
//!
//! - `connector`: polls the [`ServerConnector`](crate::ServerConnector) plugin and reports
//!   connect/disconnect to the orchestrator;
//! - `finisher`: forwards an external shutdown trigger to the orchestrator;
//! - `echo`: pushes every received message into a test-owned queue.
//!
//! The connector and finisher factories are pre-registered in every
//! [`BlockFactories::with_builtins`](crate::BlockFactories::with_builtins) table.

mod connector;
mod echo;
mod finisher;

pub(crate) use connector::{connector_factory, setup_message};
pub use echo::{ECHO_NAME, echo_factory};
pub(crate) use finisher::finisher_factory;
pub use finisher::FinisherConfig;
