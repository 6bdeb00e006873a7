use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::RuntimeError;

use super::builder::Runtime;
use super::launch::ShootDown;

/// A launched runtime running on a background task.
///
/// # Example
/// ```no_run
/// use blockvisor::{Config, Runner, Runtime};
///
/// # async fn demo() -> Result<(), blockvisor::RuntimeError> {
/// let runner = Runner::start(Runtime::builder(Config::default()).build()).await?;
/// runner.wait().await; // until a termination signal
/// # Ok(())
/// # }
/// ```
pub struct Runner {
    shoot_down: ShootDown,
    done: CancellationToken,
}

impl Runner {
    /// Prepares `runtime` and launches it on a new task.
    pub async fn start(runtime: Runtime) -> Result<Self, RuntimeError> {
        let (launch, shoot_down) = runtime.prepare().await?;
        let done = CancellationToken::new();

        let guard = done.clone().drop_guard();
        tokio::spawn(async move {
            let _guard = guard;
            launch.launch().await;
            debug!("runner finished");
        });

        Ok(Self { shoot_down, done })
    }

    /// Shuts the runtime down and waits for it; no-op once it finished.
    pub async fn stop(&self) {
        if self.done.is_cancelled() {
            return;
        }
        self.shoot_down.shoot_down().await;
    }

    /// Waits until the runtime finished.
    pub async fn wait(&self) {
        self.done.cancelled().await;
    }

    /// True once the runtime finished.
    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Shutdown handle of the running runtime.
    pub fn shoot_down(&self) -> &ShootDown {
        &self.shoot_down
    }
}
