//! # Finisher block: turns an external trigger into a shutdown request.
//!
//! Triggers:
//! - any message sent to the finisher (administrative/debug trigger);
//! - an OS termination signal, unless the `finisher` configuration disables it:
//!   `{"signals": false}`.
//!
//! On the first trigger the block asks the orchestrator to finish and stops listening.
//! `finish` releases a `run` that is still waiting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::blocks::{Block, FINISHER_NAME, INITIATOR_RESPONSIBILITY};
use crate::config::ConfFactory;
use crate::core::{Communicator, wait_for_termination};
use crate::error::BlockError;
use crate::messages::Msg;

/// Configuration of the finisher, stored under `"finisher"`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FinisherConfig {
    /// Listen for OS termination signals.
    pub signals: bool,
}

impl Default for FinisherConfig {
    fn default() -> Self {
        Self { signals: true }
    }
}

/// Factory of the built-in finisher block.
pub(crate) fn finisher_factory() -> Block {
    let shared = Arc::new(Shared::default());
    let on_init = Arc::clone(&shared);
    let on_run = Arc::clone(&shared);
    let on_finish = Arc::clone(&shared);
    let on_message = shared;

    Block::new()
        .on_init(move |conf: ConfFactory| {
            let shared = Arc::clone(&on_init);
            async move {
                let cfg: FinisherConfig = conf.load_or_default(FINISHER_NAME)?;
                shared.signals.store(cfg.signals, Ordering::SeqCst);
                Ok::<(), BlockError>(())
            }
        })
        .on_run(move |me: Communicator| Arc::clone(&on_run).run(me))
        .on_finish(move |_during_init: bool| {
            let shared = Arc::clone(&on_finish);
            async move { shared.done.cancel() }
        })
        .on_message(move |_msg: Msg| {
            let shared = Arc::clone(&on_message);
            async move { shared.trigger.cancel() }
        })
}

#[derive(Default)]
struct Shared {
    signals: AtomicBool,
    trigger: CancellationToken,
    done: CancellationToken,
}

impl Shared {
    async fn run(self: Arc<Self>, me: Communicator) {
        let signals = self.signals.load(Ordering::SeqCst);
        let reason = tokio::select! {
            biased;
            _ = self.done.cancelled() => return,
            _ = self.trigger.cancelled() => "message",
            name = termination(signals) => name,
        };

        info!(trigger = reason, "shutdown requested");
        if let Some(initiator) = me.communicator(INITIATOR_RESPONSIBILITY) {
            initiator.finish();
        }
    }
}

async fn termination(enabled: bool) -> &'static str {
    if enabled {
        match wait_for_termination().await {
            Ok(name) => return name,
            Err(e) => warn!(error = %e, "signal handlers unavailable"),
        }
    }
    std::future::pending().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::{MapConfig, NoConfig};
    use crate::error::ConfigError;

    #[tokio::test]
    async fn signals_are_on_by_default() {
        let conf: ConfFactory = Arc::new(NoConfig);
        let cfg: FinisherConfig = conf.load_or_default(FINISHER_NAME).unwrap();
        assert!(cfg.signals);

        let conf: ConfFactory = Arc::new(
            MapConfig::new().with(FINISHER_NAME, serde_json::json!({"signals": false})),
        );
        let cfg: FinisherConfig = conf.load_or_default(FINISHER_NAME).unwrap();
        assert!(!cfg.signals);
    }

    #[tokio::test]
    async fn bad_configuration_fails_init() {
        let conf: ConfFactory = Arc::new(
            MapConfig::new().with(FINISHER_NAME, serde_json::json!({"signals": "maybe"})),
        );
        let err = conf
            .load_or_default::<FinisherConfig>(FINISHER_NAME)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[tokio::test]
    async fn disabled_signals_never_fire() {
        let waited = tokio::time::timeout(Duration::from_millis(20), termination(false)).await;
        assert!(waited.is_err());
    }
}
