//! # Connector block: keeps the process connected to its server.
//!
//! The block is idle until the orchestrator sends it a setup message carrying the
//! [`ServerConnector`] plugin and the polling interval. From then on, every tick runs the
//! current action:
//!
//! ```text
//!            connect() ok ─► "__connected" to initiator
//!   ┌─────────┐ ─────────────────────────────────► ┌──────────────────┐
//!   │ Connect │                                    │ CheckConnection  │
//!   └─────────┘ ◄───────────────────────────────── └──────────────────┘
//!        ▲        is_connected() false ─► "__disconnected" to initiator
//!        │
//!   failed connect: retried on the next tick, nothing reported
//! ```
//!
//! On shutdown the ticker stops and the plugin is disconnected once; `finish` returns
//! only after that happened.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use once_cell::sync::OnceCell;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::blocks::{Block, INITIATOR_RESPONSIBILITY};
use crate::config::{ConfFactory, DEFAULT_CONNECTOR_TIMEOUT, NoConfig};
use crate::core::Communicator;
use crate::messages::{CONNECTOR_KEY, Msg, SETUP_MSG, TIMEOUT_KEY, Value};
use crate::server::ServerConnector;

/// Builds the setup message handing `plugin` to the connector block.
pub(crate) fn setup_message(plugin: Arc<dyn ServerConnector>, interval: Duration) -> Msg {
    let mut msg = Msg::reserved(SETUP_MSG);
    msg.set_reserved(CONNECTOR_KEY, Value::handle(plugin));
    msg.set_reserved(TIMEOUT_KEY, Value::Duration(interval));
    msg
}

/// Factory of the built-in connector block.
pub(crate) fn connector_factory() -> Block {
    let shared = Arc::new(Shared::new());
    let on_init = Arc::clone(&shared);
    let on_run = Arc::clone(&shared);
    let on_finish = Arc::clone(&shared);
    let on_message = shared;

    Block::new()
        .on_init(move |conf: ConfFactory| {
            let shared = Arc::clone(&on_init);
            async move {
                let _ = shared.conf.set(conf);
                Ok(())
            }
        })
        .on_run(move |me: Communicator| Arc::clone(&on_run).run(me))
        .on_finish(move |during_init: bool| Arc::clone(&on_finish).finish(during_init))
        .on_message(move |msg: Msg| {
            let shared = Arc::clone(&on_message);
            async move { shared.on_setup(msg) }
        })
}

struct Shared {
    conf: OnceCell<ConfFactory>,
    setup_tx: mpsc::Sender<Msg>,
    setup_rx: Mutex<mpsc::Receiver<Msg>>,
    shutdown: CancellationToken,
    stopped: CancellationToken,
    started: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        let (setup_tx, setup_rx) = mpsc::channel(1);
        Self {
            conf: OnceCell::new(),
            setup_tx,
            setup_rx: Mutex::new(setup_rx),
            shutdown: CancellationToken::new(),
            stopped: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    fn on_setup(&self, msg: Msg) {
        if msg.name() != Some(SETUP_MSG) {
            debug!("connector ignores non-setup message");
            return;
        }
        if self.setup_tx.try_send(msg).is_err() {
            warn!("connector already set up, setup message rejected");
        }
    }

    async fn run(self: Arc<Self>, me: Communicator) {
        let _stopped = self.stopped.clone().drop_guard();
        self.started.store(true, Ordering::SeqCst);

        let Some(initiator) = me.communicator(INITIATOR_RESPONSIBILITY) else {
            return;
        };

        let setup = {
            let mut rx = self.setup_rx.lock().await;
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return,
                msg = rx.recv() => msg,
            }
        };
        let Some(setup) = setup else {
            return;
        };

        let conf = self
            .conf
            .get()
            .cloned()
            .unwrap_or_else(|| Arc::new(NoConfig));
        let Some(mut link) = Link::from_setup(&setup, conf, initiator) else {
            warn!("setup message carries no connector plugin");
            self.shutdown.cancelled().await;
            return;
        };

        let period = link.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval = ?period, "connector ticking");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => link.tick().await,
            }
        }
        link.close().await;
    }

    async fn finish(self: Arc<Self>, during_init: bool) {
        if during_init {
            return;
        }
        self.shutdown.cancel();
        if self.started.load(Ordering::SeqCst) {
            self.stopped.cancelled().await;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Connect,
    CheckConnection,
    Nop,
}

/// Connection state, owned by the connector's `run` task.
struct Link {
    plugin: Option<Arc<dyn ServerConnector>>,
    interval: Duration,
    conf: ConfFactory,
    initiator: Communicator,
    connected: bool,
    next: Action,
}

impl Link {
    fn from_setup(msg: &Msg, conf: ConfFactory, initiator: Communicator) -> Option<Self> {
        let plugin = msg
            .get(CONNECTOR_KEY)?
            .downcast_ref::<Arc<dyn ServerConnector>>()?
            .clone();
        let interval = msg
            .get(TIMEOUT_KEY)
            .and_then(Value::as_duration)
            .unwrap_or(DEFAULT_CONNECTOR_TIMEOUT)
            .max(Duration::from_millis(1));
        Some(Self {
            plugin: Some(plugin),
            interval,
            conf,
            initiator,
            connected: false,
            next: Action::Connect,
        })
    }

    async fn tick(&mut self) {
        match self.next {
            Action::Connect => self.connect().await,
            Action::CheckConnection => self.check_connection().await,
            Action::Nop => {}
        }
    }

    async fn connect(&mut self) {
        let Some(plugin) = &self.plugin else {
            return;
        };
        if self.connected {
            return;
        }
        match plugin.connect(&self.conf).await {
            Ok(connection) => {
                info!("server connected");
                self.initiator.send(Msg::server_connected(connection));
                self.connected = true;
                self.next = Action::CheckConnection;
            }
            Err(e) => warn!(error = %e, label = e.as_label(), "connect attempt failed"),
        }
    }

    async fn check_connection(&mut self) {
        let Some(plugin) = &self.plugin else {
            return;
        };
        if plugin.is_connected().await {
            return;
        }
        info!("server disconnected");
        self.initiator.send(Msg::server_disconnected());
        self.connected = false;
        self.next = Action::Connect;
    }

    async fn close(&mut self) {
        if let Some(plugin) = self.plugin.take() {
            plugin.disconnect().await;
        }
        self.next = Action::Nop;
        self.connected = false;
    }
}
