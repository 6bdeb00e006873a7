//! # Orchestrator: the `"initiator"` block.
//!
//! Creates, initializes, starts and finishes every other block, and runs the main loop
//! over its private message queue.
//!
//! ## Phases
//! ```text
//! Created ─► Initializing ─┬─► InitFailed                      (terminal)
//!                          └─► Initialized ─► Running ─► Finishing ─► Finished
//!                                   │                        ▲
//!                                   └─ abort before run ─────┘
//! ```
//!
//! ## Startup
//! Blocks are created for every descriptor first, then `init` runs **sequentially** in
//! descriptor order. The first failure finishes the already initialized blocks in reverse
//! order with `finish(true)` and is returned; nothing keeps running.
//!
//! ## Main loop
//! ```text
//! queue.get() ──► "__finish"       ─► fan-out: communicator.finish() in reverse order (once)
//!            ├──► "__finished"     ─► count; all blocks reported ─► cancel queue ─► loop ends
//!            ├──► "__connected"    ─► notify_connected() on every application block
//!            ├──► "__disconnected" ─► notify_disconnected() on every application block
//!            └──► anything else    ─► ignored
//! ```
//!
//! ## Rules
//! - `run_started` / `abort_started` are checked and set under one lock, never held across an await.
//! - A shutdown before `run` finishes blocks directly, in reverse order; `run` then does nothing.
//! - A shutdown after `run` is an ordinary `"__finish"` message; the caller waits for the loop to end.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use once_cell::sync::OnceCell;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::blocks::{
    Block, BlockDescriptor, BlockFactories, CONNECTOR_RESPONSIBILITY, INITIATOR_RESPONSIBILITY,
};
use crate::builtin::setup_message;
use crate::config::ConfFactory;
use crate::core::active::{ActiveBlock, ActiveSet};
use crate::core::communicator::Communicator;
use crate::error::RuntimeError;
use crate::messages::{
    FINISH_MSG, FINISHED_MSG, Msg, Queue, SERVER_CONNECTED_MSG, SERVER_DISCONNECTED_MSG,
};
use crate::server::{ServerConnection, ServerConnector};

/// Lifecycle phase of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Nothing done yet.
    Created,
    /// Blocks are being created and initialized.
    Initializing,
    /// An `init` failed; initialized blocks were rolled back.
    InitFailed,
    /// Every block initialized; `run` not started.
    Initialized,
    /// Block `run` tasks started; main loop active.
    Running,
    /// Finish fan-out in progress.
    Finishing,
    /// Every block finished.
    Finished,
}

impl Phase {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Initializing => "initializing",
            Phase::InitFailed => "init_failed",
            Phase::Initialized => "initialized",
            Phase::Running => "running",
            Phase::Finishing => "finishing",
            Phase::Finished => "finished",
        }
    }
}

/// Connector plugin plus its polling interval.
pub(crate) struct ConnectorSetup {
    pub(crate) plugin: Arc<dyn ServerConnector>,
    pub(crate) interval: Duration,
}

/// Everything the orchestrator needs to build a run.
pub(crate) struct Blueprint {
    pub(crate) descriptors: Vec<BlockDescriptor>,
    pub(crate) factories: BlockFactories,
    pub(crate) conf: ConfFactory,
    pub(crate) connector: Option<ConnectorSetup>,
}

struct Flags {
    phase: Phase,
    run_started: bool,
    abort_started: bool,
}

pub(crate) struct Orchestrator {
    queue: Arc<Queue<Msg>>,
    set: OnceCell<Arc<ActiveSet>>,
    flags: Mutex<Flags>,
    done: CancellationToken,
}

impl Orchestrator {
    pub(crate) fn new() -> Self {
        Self {
            queue: Arc::new(Queue::new()),
            set: OnceCell::new(),
            flags: Mutex::new(Flags {
                phase: Phase::Created,
                run_started: false,
                abort_started: false,
            }),
            done: CancellationToken::new(),
        }
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn phase(&self) -> Phase {
        self.flags().phase
    }

    fn set_phase(&self, phase: Phase) {
        self.flags().phase = phase;
        info!(phase = phase.as_label(), "orchestrator phase");
    }

    /// Communicator of the orchestrator itself, once initialized.
    pub(crate) fn communicator(&self) -> Option<Communicator> {
        self.set.get().map(|set| Communicator::new(Arc::clone(set), 0))
    }

    /// Creates and initializes every block, or rolls back and fails.
    pub(crate) async fn initialize(&self, blueprint: Blueprint) -> Result<(), RuntimeError> {
        self.set_phase(Phase::Initializing);
        match self.build(blueprint).await {
            Ok(set) => {
                // `initialize` runs once per orchestrator.
                let _ = self.set.set(set);
                self.set_phase(Phase::Initialized);
                Ok(())
            }
            Err(e) => {
                self.set_phase(Phase::InitFailed);
                Err(e)
            }
        }
    }

    async fn build(&self, blueprint: Blueprint) -> Result<Arc<ActiveSet>, RuntimeError> {
        let Blueprint {
            descriptors,
            factories,
            conf,
            connector,
        } = blueprint;

        check_responsibilities(&descriptors)?;

        let connector_enabled = connector.is_some();
        let mut created = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let block = factories.create(&descriptor, connector_enabled)?;
            created.push(ActiveBlock::new(descriptor, block));
        }

        let mut initialized: Vec<ActiveBlock> = Vec::with_capacity(created.len() + 1);
        let initiator = BlockDescriptor::initiator();
        let head = self.head_block().validate(&initiator, true)?;
        initialized.push(ActiveBlock::new(initiator, head));

        for active in created {
            let name = active.descriptor.name();
            let responsibility = active.descriptor.responsibility();
            debug!(name, responsibility, "init");

            if let Err(source) = (active.block.init)(Arc::clone(&conf)).await {
                warn!(name, responsibility, error = %source, "init failed, rolling back");
                for done in initialized.iter().skip(1).rev() {
                    done.finish(true).await;
                }
                return Err(RuntimeError::InitFailed {
                    name: name.to_string(),
                    responsibility: responsibility.to_string(),
                    source,
                });
            }
            initialized.push(active);
        }

        let set = Arc::new(ActiveSet::new(initialized));

        if let Some(ConnectorSetup { plugin, interval }) = connector {
            match set.position(CONNECTOR_RESPONSIBILITY) {
                Some(index) => {
                    if !Communicator::new(Arc::clone(&set), index)
                        .send(setup_message(plugin, interval))
                    {
                        warn!("connector rejected its setup message");
                    }
                }
                None => warn!("connector plugin configured but no connector block is active"),
            }
        }

        Ok(set)
    }

    /// The orchestrator's own callbacks: everything lands in the private queue.
    fn head_block(&self) -> Block {
        let on_finish = Arc::clone(&self.queue);
        let on_connect = Arc::clone(&self.queue);
        let on_disconnect = Arc::clone(&self.queue);
        let on_message = Arc::clone(&self.queue);

        Block::new()
            .on_init(|_conf: ConfFactory| async { Ok(()) })
            .on_run(|_me: Communicator| async {})
            .on_finish(move |during_init: bool| {
                let queue = Arc::clone(&on_finish);
                async move {
                    if !during_init {
                        queue.put(Msg::finish_request());
                    }
                }
            })
            .on_connect(move |connection: ServerConnection| {
                let queue = Arc::clone(&on_connect);
                async move {
                    queue.put(Msg::server_connected(connection));
                }
            })
            .on_disconnect(move || {
                let queue = Arc::clone(&on_disconnect);
                async move {
                    queue.put(Msg::server_disconnected());
                }
            })
            .on_message(move |msg: Msg| {
                let queue = Arc::clone(&on_message);
                async move {
                    queue.put(msg);
                }
            })
    }

    fn activate(&self) -> bool {
        let mut flags = self.flags();
        if flags.abort_started {
            return false;
        }
        flags.run_started = true;
        flags.phase = Phase::Running;
        true
    }

    /// Starts every block's `run` and drives the main loop until all blocks finished.
    pub(crate) async fn run(&self) {
        let Some(set) = self.set.get().cloned() else {
            return;
        };
        if !self.activate() {
            debug!("shut down before launch");
            self.done.cancelled().await;
            return;
        }
        info!(
            phase = Phase::Running.as_label(),
            blocks = set.len() - 1,
            "orchestrator phase"
        );

        let mut tasks = JoinSet::new();
        for index in 1..set.len() {
            let run = Arc::clone(&set.at(index).block.run);
            let me = Communicator::new(Arc::clone(&set), index);
            tasks.spawn(async move { run(me).await });
        }

        let mut finishing = false;
        let mut finished = 0usize;
        while let Some(msg) = self.queue.get().await {
            match msg.name() {
                Some(FINISH_MSG) => {
                    if finishing {
                        debug!("finish already in progress");
                        continue;
                    }
                    finishing = true;
                    self.set_phase(Phase::Finishing);
                    for index in (1..set.len()).rev() {
                        Communicator::new(Arc::clone(&set), index).finish();
                    }
                    finished = 0;
                    if set.len() == 1 {
                        self.queue.cancel();
                    }
                }
                Some(FINISHED_MSG) => {
                    finished += 1;
                    debug!(
                        responsibility = msg.responsibility().unwrap_or_default(),
                        count = finished,
                        "block finished"
                    );
                    if finished == set.len() - 1 {
                        self.queue.cancel();
                    }
                }
                Some(SERVER_CONNECTED_MSG) => {
                    if let Some(connection) = msg.connection() {
                        broadcast(&set, |c| c.notify_connected(Arc::clone(&connection)));
                    }
                }
                Some(SERVER_DISCONNECTED_MSG) => broadcast(&set, Communicator::notify_disconnected),
                _ => {}
            }
        }

        tasks.shutdown().await;
        set.at(0).close_mailbox();
        self.set_phase(Phase::Finished);
        self.done.cancel();
    }

    /// Graceful shutdown, safe before, during or after `run`, and safe to repeat.
    pub(crate) async fn abort(&self) {
        let Some(set) = self.set.get().cloned() else {
            return;
        };

        let before_run = {
            let mut flags = self.flags();
            if flags.run_started {
                false
            } else if flags.abort_started {
                return;
            } else {
                flags.abort_started = true;
                true
            }
        };

        if before_run {
            self.set_phase(Phase::Finishing);
            for index in (1..set.len()).rev() {
                let active = set.at(index);
                active.finish(false).await;
                active.close_mailbox();
            }
            set.at(0).close_mailbox();
            self.queue.cancel();
            self.set_phase(Phase::Finished);
            self.done.cancel();
            return;
        }

        self.queue.put(Msg::finish_request());
        self.done.cancelled().await;
    }
}

fn check_responsibilities(descriptors: &[BlockDescriptor]) -> Result<(), RuntimeError> {
    let mut seen = HashSet::with_capacity(descriptors.len());
    for d in descriptors {
        if d.responsibility() == INITIATOR_RESPONSIBILITY {
            return Err(RuntimeError::ReservedResponsibility {
                name: d.name().to_string(),
                responsibility: d.responsibility().to_string(),
            });
        }
        if !seen.insert(d.responsibility()) {
            return Err(RuntimeError::DuplicateResponsibility {
                name: d.name().to_string(),
                responsibility: d.responsibility().to_string(),
            });
        }
    }
    Ok(())
}

/// Notifies every block except the orchestrator and the connector.
fn broadcast(set: &Arc<ActiveSet>, notify: impl Fn(&Communicator) -> bool) {
    let connector = set.position(CONNECTOR_RESPONSIBILITY);
    for index in 1..set.len() {
        if Some(index) == connector {
            continue;
        }
        notify(&Communicator::new(Arc::clone(set), index));
    }
}
