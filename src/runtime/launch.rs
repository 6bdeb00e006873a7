use std::fmt;
use std::sync::Arc;

use crate::core::{Communicator, Orchestrator, Phase};

/// Starts a prepared runtime.
///
/// [`launch`](Launch::launch) returns once every block finished.
pub struct Launch {
    orchestrator: Arc<Orchestrator>,
}

impl Launch {
    pub(crate) fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Starts every block's `run` and waits until the process has shut down.
    ///
    /// If the runtime was shot down before launch, waits for that shutdown and returns.
    pub async fn launch(self) {
        self.orchestrator.run().await;
    }
}

/// Triggers a graceful shutdown.
///
/// Cloneable, safe before, during and after [`Launch::launch`], and safe to call many times:
/// only one finish fan-out ever happens.
#[derive(Clone)]
pub struct ShootDown {
    orchestrator: Arc<Orchestrator>,
}

impl ShootDown {
    pub(crate) fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Finishes every block and waits for it.
    ///
    /// Before launch, blocks are finished directly in reverse order. After launch, this
    /// is an ordinary shutdown request and returns once the main loop has ended.
    pub async fn shoot_down(&self) {
        self.orchestrator.abort().await;
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.orchestrator.phase()
    }

    /// Communicator of the orchestrator (`"initiator"`).
    ///
    /// Lets the embedding application message blocks or broadcast server notifications.
    pub fn communicator(&self) -> Option<Communicator> {
        self.orchestrator.communicator()
    }
}

impl fmt::Debug for ShootDown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShootDown")
            .field("phase", &self.phase())
            .finish()
    }
}
