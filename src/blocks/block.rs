//! # Block: a bundle of lifecycle callbacks.
//!
//! A [`Block`] is assembled by chaining callback setters on [`Block::new`]. Every field is
//! optional while building; the registry validates the bundle once, when it creates the
//! block for a descriptor:
//! - `init`, `run`, `finish` are mandatory;
//! - `on_connect` / `on_disconnect` require a configured connector plugin;
//! - `on_message` is optional.
//!
//! Each setter takes a closure producing a fresh future per call, in the same way
//! task closures are boxed elsewhere in the runtime. Shared state goes into an `Arc`
//! captured by the closures.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use blockvisor::{Block, Communicator, ConfFactory, Msg};
//!
//! let stop = CancellationToken::new();
//! let block = Block::new()
//!     .on_init(|_conf: ConfFactory| async { Ok(()) })
//!     .on_run({
//!         let stop = stop.clone();
//!         move |_me: Communicator| {
//!             let stop = stop.clone();
//!             async move { stop.cancelled().await }
//!         }
//!     })
//!     .on_finish(move |_during_init: bool| {
//!         let stop = stop.clone();
//!         async move { stop.cancel() }
//!     })
//!     .on_message(|msg: Msg| async move { let _ = msg; });
//! # let _ = block;
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::blocks::BlockDescriptor;
use crate::config::ConfFactory;
use crate::core::Communicator;
use crate::error::{BlockError, RuntimeError};
use crate::messages::Msg;
use crate::server::ServerConnection;

pub(crate) type InitFn =
    Arc<dyn Fn(ConfFactory) -> BoxFuture<'static, Result<(), BlockError>> + Send + Sync>;
pub(crate) type RunFn = Arc<dyn Fn(Communicator) -> BoxFuture<'static, ()> + Send + Sync>;
pub(crate) type FinishFn = Arc<dyn Fn(bool) -> BoxFuture<'static, ()> + Send + Sync>;
pub(crate) type ConnectFn = Arc<dyn Fn(ServerConnection) -> BoxFuture<'static, ()> + Send + Sync>;
pub(crate) type DisconnectFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;
pub(crate) type MessageFn = Arc<dyn Fn(Msg) -> BoxFuture<'static, ()> + Send + Sync>;

/// Lifecycle callbacks of one block, all optional until validated.
#[derive(Clone, Default)]
pub struct Block {
    init: Option<InitFn>,
    run: Option<RunFn>,
    finish: Option<FinishFn>,
    on_connect: Option<ConnectFn>,
    on_disconnect: Option<DisconnectFn>,
    on_message: Option<MessageFn>,
}

impl Block {
    /// Creates a block with no callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `init`: called once, sequentially with other blocks, before any `run`.
    ///
    /// Keep it short; do not talk to the server here.
    #[must_use]
    pub fn on_init<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ConfFactory) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BlockError>> + Send + 'static,
    {
        self.init = Some(Arc::new(move |conf: ConfFactory| f(conf).boxed()));
        self
    }

    /// Sets `run`: spawned on its own task after every block initialized.
    ///
    /// The [`Communicator`] is the block's handle to itself and to other blocks.
    #[must_use]
    pub fn on_run<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Communicator) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.run = Some(Arc::new(move |me: Communicator| f(me).boxed()));
        self
    }

    /// Sets `finish`: called once on shutdown.
    ///
    /// The flag is `true` when the call rolls back a failed startup (`run` never started).
    #[must_use]
    pub fn on_finish<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(bool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.finish = Some(Arc::new(move |during_init: bool| f(during_init).boxed()));
        self
    }

    /// Sets `on_connect`: the server connection became available.
    #[must_use]
    pub fn on_connect<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ServerConnection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_connect = Some(Arc::new(move |conn: ServerConnection| f(conn).boxed()));
        self
    }

    /// Sets `on_disconnect`: a previously connected server went away.
    #[must_use]
    pub fn on_disconnect<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_disconnect = Some(Arc::new(move || f().boxed()));
        self
    }

    /// Sets `on_message`: deliveries are serialized and keep submission order.
    #[must_use]
    pub fn on_message<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Msg) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_message = Some(Arc::new(move |msg: Msg| f(msg).boxed()));
        self
    }

    /// True if the block listens to server connect/disconnect.
    pub fn wants_server_events(&self) -> bool {
        self.on_connect.is_some() || self.on_disconnect.is_some()
    }

    /// Checks the bundle against the rules above and freezes it.
    pub(crate) fn validate(
        self,
        descriptor: &BlockDescriptor,
        connector_enabled: bool,
    ) -> Result<BlockCallbacks, RuntimeError> {
        let missing = |callback: &'static str| RuntimeError::MissingCallback {
            name: descriptor.name().to_string(),
            responsibility: descriptor.responsibility().to_string(),
            callback,
        };

        if !connector_enabled && self.wants_server_events() {
            return Err(RuntimeError::ConnectorCallbacksUnsupported {
                name: descriptor.name().to_string(),
                responsibility: descriptor.responsibility().to_string(),
            });
        }

        Ok(BlockCallbacks {
            init: self.init.ok_or_else(|| missing("init"))?,
            run: self.run.ok_or_else(|| missing("run"))?,
            finish: self.finish.ok_or_else(|| missing("finish"))?,
            on_connect: self.on_connect,
            on_disconnect: self.on_disconnect,
            on_message: self.on_message,
        })
    }
}

/// Validated callbacks: the mandatory ones are guaranteed present.
#[derive(Clone)]
pub(crate) struct BlockCallbacks {
    pub(crate) init: InitFn,
    pub(crate) run: RunFn,
    pub(crate) finish: FinishFn,
    pub(crate) on_connect: Option<ConnectFn>,
    pub(crate) on_disconnect: Option<DisconnectFn>,
    pub(crate) on_message: Option<MessageFn>,
}
