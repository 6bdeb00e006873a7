//! Echo block: a stand-in for a block that is not written yet.
//!
//! Every message it receives is pushed to a caller-owned [`Queue`]; when the block
//! finishes, its `run` returns and cancels that queue. Register it under any name and
//! give it the responsibility of the missing block.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::blocks::Block;
use crate::config::ConfFactory;
use crate::core::Communicator;
use crate::messages::{Msg, Queue};

/// Conventional registry name of the echo block.
pub const ECHO_NAME: &str = "echo";

/// Returns a factory of echo blocks reporting into `out`.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use blockvisor::{BlockFactories, ECHO_NAME, Queue, echo_factory};
///
/// let out = Arc::new(Queue::new());
/// let factories = BlockFactories::with_builtins().with(ECHO_NAME, echo_factory(out));
/// assert!(factories.contains(ECHO_NAME));
/// ```
pub fn echo_factory(out: Arc<Queue<Msg>>) -> impl Fn() -> Block + Send + Sync + 'static {
    move || {
        let done = CancellationToken::new();
        let on_run = (done.clone(), Arc::clone(&out));
        let on_message = Arc::clone(&out);

        Block::new()
            .on_init(|_conf: ConfFactory| async { Ok(()) })
            .on_run(move |_me: Communicator| {
                let (done, out) = (on_run.0.clone(), Arc::clone(&on_run.1));
                async move {
                    done.cancelled().await;
                    out.cancel();
                }
            })
            .on_finish(move |_during_init: bool| {
                let done = done.clone();
                async move { done.cancel() }
            })
            .on_message(move |msg: Msg| {
                let out = Arc::clone(&on_message);
                async move {
                    out.put(msg);
                }
            })
    }
}
