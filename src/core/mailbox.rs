//! # Mailbox: serialized delivery to one block.
//!
//! Wraps a block's `on_message` callback so that deliveries never overlap and keep
//! submission order, while [`submit`](Mailbox::submit) never blocks the sender.
//!
//! ```text
//! send() ─┐
//! send() ─┼─► [ Queue<Msg> ] ─► consumer task ─► on_message(m1); on_message(m2); ...
//! send() ─┘        ▲
//!                  └─ cancel(): reject new, drain what is queued, then the task exits
//! ```
//!
//! The consumer task is spawned on the first accepted submission and never restarted. It is
//! spawned through the runtime the mailbox was created in, so `submit` also works from
//! threads outside that runtime.
//! A panicking `on_message` is caught and logged; delivery continues with the next message.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};

use futures::FutureExt;
use tokio::runtime::Handle;
use tracing::{debug, error};

use crate::blocks::MessageFn;
use crate::messages::{Msg, Queue};

pub(crate) struct Mailbox {
    responsibility: Arc<str>,
    queue: Arc<Queue<Msg>>,
    handler: MessageFn,
    started: Once,
    runtime: Handle,
}

impl Mailbox {
    /// Must be called inside a tokio runtime.
    pub(crate) fn new(responsibility: &str, handler: MessageFn) -> Self {
        Self {
            responsibility: Arc::from(responsibility),
            queue: Arc::new(Queue::new()),
            handler,
            started: Once::new(),
            runtime: Handle::current(),
        }
    }

    /// Enqueues `msg`; false once the mailbox is cancelled.
    pub(crate) fn submit(&self, msg: Msg) -> bool {
        if !self.queue.put(msg) {
            return false;
        }
        self.started.call_once(|| self.spawn_consumer());
        true
    }

    /// Stops accepting messages. Already queued ones are still delivered.
    pub(crate) fn cancel(&self) {
        if !self.queue.is_cancelled() {
            debug!(responsibility = %self.responsibility, "mailbox cancelled");
        }
        self.queue.cancel();
    }

    fn spawn_consumer(&self) {
        let queue = Arc::clone(&self.queue);
        let handler = Arc::clone(&self.handler);
        let responsibility = Arc::clone(&self.responsibility);

        debug!(responsibility = %responsibility, "mailbox consumer started");
        self.runtime.spawn(async move {
            while let Some(msg) = queue.get().await {
                let delivery = AssertUnwindSafe(async { handler(msg).await }).catch_unwind();
                if let Err(panic_err) = delivery.await {
                    error!(
                        responsibility = %responsibility,
                        panic = ?panic_err,
                        "on_message panicked"
                    );
                }
            }
            debug!(responsibility = %responsibility, "mailbox consumer stopped");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::messages::Value;

    fn recorder(out: Arc<Queue<Msg>>) -> MessageFn {
        Arc::new(move |msg: Msg| {
            let out = Arc::clone(&out);
            async move {
                out.put(msg);
            }
            .boxed()
        })
    }

    async fn next(q: &Queue<Msg>) -> Msg {
        tokio::time::timeout(Duration::from_secs(1), q.get())
            .await
            .expect("delivery timed out")
            .expect("queue closed")
    }

    #[tokio::test]
    async fn concurrent_senders_keep_their_own_order() {
        let out = Arc::new(Queue::new());
        let mailbox = Arc::new(Mailbox::new("m", recorder(Arc::clone(&out))));

        let mut senders = Vec::new();
        for sender in 0..4i64 {
            let mailbox = Arc::clone(&mailbox);
            senders.push(tokio::spawn(async move {
                for seq in 0..25i64 {
                    let msg = Msg::new()
                        .with("sender", sender)
                        .unwrap()
                        .with("seq", seq)
                        .unwrap();
                    assert!(mailbox.submit(msg));
                    tokio::task::yield_now().await;
                }
            }));
        }
        for s in senders {
            s.await.unwrap();
        }

        let mut last = [-1i64; 4];
        for _ in 0..100 {
            let msg = next(&out).await;
            let sender = msg.get("sender").and_then(Value::as_i64).unwrap() as usize;
            let seq = msg.get("seq").and_then(Value::as_i64).unwrap();
            assert!(seq > last[sender], "sender {sender} reordered");
            last[sender] = seq;
        }
        assert_eq!(last, [24; 4]);
    }

    #[tokio::test]
    async fn deliveries_never_overlap() {
        let busy = Arc::new(AtomicBool::new(false));
        let count = Arc::new(AtomicUsize::new(0));
        let handler: MessageFn = {
            let busy = Arc::clone(&busy);
            let count = Arc::clone(&count);
            Arc::new(move |_msg: Msg| {
                let busy = Arc::clone(&busy);
                let count = Arc::clone(&count);
                async move {
                    assert!(!busy.swap(true, Ordering::SeqCst), "overlapping delivery");
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    busy.store(false, Ordering::SeqCst);
                    count.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            })
        };
        let mailbox = Mailbox::new("m", handler);
        for _ in 0..10 {
            assert!(mailbox.submit(Msg::new()));
        }
        tokio::time::timeout(Duration::from_secs(2), async {
            while count.load(Ordering::SeqCst) < 10 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("not all messages delivered");
    }

    #[tokio::test]
    async fn cancelled_mailbox_rejects_but_drains() {
        let out = Arc::new(Queue::new());
        let mailbox = Mailbox::new("m", recorder(Arc::clone(&out)));
        assert!(mailbox.submit(Msg::new().with("n", 1).unwrap()));
        mailbox.cancel();
        assert!(!mailbox.submit(Msg::new().with("n", 2).unwrap()));

        let first = next(&out).await;
        assert_eq!(first.get("n").and_then(Value::as_i64), Some(1));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(out.try_get().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn submit_works_from_a_plain_thread() {
        let out = Arc::new(Queue::new());
        let mailbox = Arc::new(Mailbox::new("m", recorder(Arc::clone(&out))));

        let sender = Arc::clone(&mailbox);
        let accepted = std::thread::spawn(move || {
            (0..3i64).all(|n| sender.submit(Msg::new().with("n", n).unwrap()))
        })
        .join()
        .unwrap();
        assert!(accepted);

        for n in 0..3i64 {
            assert_eq!(next(&out).await.get("n").and_then(Value::as_i64), Some(n));
        }
    }

    #[tokio::test]
    async fn panicking_handler_does_not_stop_delivery() {
        let out = Arc::new(Queue::new());
        let handler: MessageFn = {
            let out = Arc::clone(&out);
            Arc::new(move |msg: Msg| {
                let out = Arc::clone(&out);
                async move {
                    if msg.contains_key("boom") {
                        panic!("handler exploded");
                    }
                    out.put(msg);
                }
                .boxed()
            })
        };
        let mailbox = Mailbox::new("m", handler);
        assert!(mailbox.submit(Msg::new().with("boom", true).unwrap()));
        assert!(mailbox.submit(Msg::new().with("ok", true).unwrap()));
        assert!(next(&out).await.contains_key("ok"));
    }
}
