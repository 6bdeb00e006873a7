//! # Runtime façade.
//!
//! Assembles block descriptors, a factory table, a configuration source and an optional
//! connector plugin into a startable and abortable unit.
//!
//! ```text
//! RuntimeBuilder ─► Runtime ─► prepare() ──► Err(RuntimeError)   (nothing left running)
//!                                  │
//!                                  └──► (Launch, ShootDown)
//!                                          │        │
//!                              launch() ◄──┘        └──► shoot_down()   (idempotent)
//!                   waits for full shutdown               before or after launch
//! ```
//!
//! Blocks created by the orchestrator, in order:
//! 1. the finisher (always);
//! 2. the connector (only with a plugin);
//! 3. application blocks, in configured order.
//!
//! [`Runner`] wraps the pair for processes that just want `start` / `stop` / `wait`.

mod builder;
mod launch;
mod runner;

#[cfg(test)]
mod scenarios;

pub use builder::{Runtime, RuntimeBuilder};
pub use launch::{Launch, ShootDown};
pub use runner::Runner;
