//! # blockvisor
//!
//! **Blockvisor** is a block lifecycle and messaging runtime for sidecar-style processes.
//!
//! A process is a set of *blocks*: independent units of behavior identified by a
//! `(name, responsibility)` pair. The runtime creates them from a factory table, initializes
//! them in order (rolling back on failure), runs them concurrently, lets them message each
//! other by responsibility, relays server connect/disconnect events and shuts everything
//! down exactly once, in reverse order.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  finisher    │   │  connector   │   │  app blocks  │
//!     │ (shutdown    │   │ (polls the   │   │ (factories   │
//!     │  trigger)    │   │  plugin)     │   │  by name)    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator ("initiator", index 0 of the active set)            │
//! │  - creates every block, then runs init sequentially               │
//! │  - spawns every run(communicator)                                 │
//! │  - main loop over its private Queue<Msg>                          │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ Communicator │   │ Communicator │   │ Communicator │
//!     │  + Mailbox   │   │  + Mailbox   │   │  + Mailbox   │
//!     └──────────────┘   └──────────────┘   └──────────────┘
//!     send(msg)      ─► target mailbox ─► on_message (serialized, in order)
//!     notify_*(..)   ─► on_connect / on_disconnect (own task)
//!     finish()       ─► finish(false) ─► "__finished" to the orchestrator
//! ```
//!
//! ### Lifecycle
//! ```text
//! RuntimeBuilder::build() ─► Runtime::prepare()
//!   ├─► create every block          (unknown name / missing callback ─► Err, no init ran)
//!   ├─► init in order               (failure ─► finish(true) in reverse ─► Err)
//!   └─► (Launch, ShootDown)
//!
//! Launch::launch()
//!   ├─► spawn run() of every block
//!   └─► loop over queue {
//!         "__finish"       ─► finish() on every block, reverse order, once
//!         "__finished"     ─► all reported ─► exit
//!         "__connected"    ─► on_connect on every application block
//!         "__disconnected" ─► on_disconnect on every application block
//!       }
//!
//! ShootDown::shoot_down()
//!   ├─ before launch ─► finish(false) in reverse, launch() then returns at once
//!   └─ after launch  ─► "__finish", wait for the loop to end
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                         |
//! |-------------------|----------------------------------------------------------------|--------------------------------------------|
//! | **Blocks**        | Callback bundles, identities and the factory table.            | [`Block`], [`BlockDescriptor`], [`BlockFactories`] |
//! | **Runtime**       | Prepare, launch and shut down a set of blocks.                 | [`Runtime`], [`Launch`], [`ShootDown`], [`Runner`] |
//! | **Messaging**     | Schema-less envelopes and ordered per-block delivery.          | [`Msg`], [`Value`], [`Communicator`]       |
//! | **Server**        | Pluggable connection checked by the built-in connector block.  | [`ServerConnector`], [`DummyConnector`]    |
//! | **Errors**        | Typed errors with stable labels.                               | [`RuntimeError`], [`BlockError`]           |
//! | **Configuration** | Runtime knobs and per-block configuration sources.             | [`Config`], [`ConfigSource`], [`MapConfig`] |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use blockvisor::{
//!     Block, BlockDescriptor, BlockFactories, Communicator, ConfFactory, Config, MapConfig, Msg,
//!     Runtime,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // A block that asks for shutdown as soon as it runs.
//!     let factories = BlockFactories::with_builtins().with("oneshot", || {
//!         Block::new()
//!             .on_init(|_conf: ConfFactory| async { Ok(()) })
//!             .on_run(|me: Communicator| async move {
//!                 if let Some(finisher) = me.communicator("finisher") {
//!                     finisher.send(Msg::new());
//!                 }
//!             })
//!             .on_finish(|_during_init: bool| async {})
//!     });
//!
//!     let conf = MapConfig::new().with("finisher", serde_json::json!({"signals": false}));
//!     let runtime = Runtime::builder(Config::default())
//!         .with_factories(factories)
//!         .with_config_source(Arc::new(conf))
//!         .with_block(BlockDescriptor::new("oneshot", "main"))
//!         .build();
//!
//!     let (launch, _shoot_down) = runtime.prepare().await?;
//!     launch.launch().await;
//!     Ok(())
//! }
//! ```
mod blocks;
mod builtin;
mod config;
mod core;
mod error;
mod messages;
mod runtime;
mod server;

// ---- Public re-exports ----

pub use blocks::{
    Block, BlockDescriptor, BlockFactories, BlockFactory, CONNECTOR_NAME,
    CONNECTOR_RESPONSIBILITY, FINISHER_NAME, FINISHER_RESPONSIBILITY, INITIATOR_RESPONSIBILITY,
    default_factories, register_block_factory,
};
pub use builtin::{ECHO_NAME, FinisherConfig, echo_factory};
pub use config::{ConfFactory, Config, ConfigSource, DEFAULT_CONNECTOR_TIMEOUT, MapConfig, NoConfig};
pub use core::{Communicator, Phase};
pub use error::{
    BlockError, ConfigError, ConnectorError, MessageError, RegistryError, RuntimeError,
};
pub use messages::{
    CONNECTION_KEY, CONNECTOR_KEY, FINISH_MSG, FINISHED_MSG, Msg, NAME_KEY, Queue,
    RESERVED_PREFIX, RESP_KEY, SERVER_CONNECTED_MSG, SERVER_DISCONNECTED_MSG, SETUP_MSG,
    TIMEOUT_KEY, Value,
};
pub use runtime::{Launch, Runner, Runtime, RuntimeBuilder, ShootDown};
pub use server::{DummyConnector, ServerConnection, ServerConnector};
