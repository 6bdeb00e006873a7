//! End-to-end runs through the façade.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::blocks::{Block, BlockDescriptor, BlockFactories, FINISHER_NAME, FINISHER_RESPONSIBILITY};
use crate::builtin::{ECHO_NAME, echo_factory};
use crate::config::{ConfFactory, Config, MapConfig};
use crate::core::{Communicator, Phase};
use crate::error::BlockError;
use crate::messages::{Msg, Queue};
use crate::server::{DummyConnector, ServerConnection};

use super::{Launch, Runner, Runtime, ShootDown};

type Journal = Arc<Mutex<Vec<String>>>;

fn record(journal: &Journal, entry: String) {
    journal.lock().unwrap().push(entry);
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

fn count(journal: &Journal, entry: &str) -> usize {
    entries(journal).iter().filter(|e| *e == entry).count()
}

/// Application block recording its lifecycle; `run` lasts until `finish`.
fn probe(
    journal: Journal,
    tag: &'static str,
    fail_init: bool,
) -> impl Fn() -> Block + Send + Sync + 'static {
    move || {
        let stop = CancellationToken::new();
        let (j_init, j_run, j_finish, j_msg) = (
            Arc::clone(&journal),
            Arc::clone(&journal),
            Arc::clone(&journal),
            Arc::clone(&journal),
        );
        let run_stop = stop.clone();

        Block::new()
            .on_init(move |_conf: ConfFactory| {
                let journal = Arc::clone(&j_init);
                async move {
                    record(&journal, format!("init {tag}"));
                    if fail_init {
                        return Err(BlockError::fail(format!("{tag} refused")));
                    }
                    Ok(())
                }
            })
            .on_run(move |_me: Communicator| {
                let (journal, stop) = (Arc::clone(&j_run), run_stop.clone());
                async move {
                    record(&journal, format!("run {tag}"));
                    stop.cancelled().await;
                }
            })
            .on_finish(move |during_init: bool| {
                let (journal, stop) = (Arc::clone(&j_finish), stop.clone());
                async move {
                    record(&journal, format!("finish({during_init}) {tag}"));
                    stop.cancel();
                }
            })
            .on_message(move |msg: Msg| {
                let journal = Arc::clone(&j_msg);
                async move {
                    let text = msg.get_str("text").unwrap_or_default().to_string();
                    record(&journal, format!("msg {tag} {text}"));
                }
            })
    }
}

/// Application block reporting server events into `out`.
fn listener(out: Arc<Queue<Msg>>, tag: &'static str) -> impl Fn() -> Block + Send + Sync + 'static {
    move || {
        let stop = CancellationToken::new();
        let run_stop = stop.clone();
        let (on_connect, on_disconnect) = (Arc::clone(&out), Arc::clone(&out));

        Block::new()
            .on_init(|_conf: ConfFactory| async { Ok(()) })
            .on_run(move |_me: Communicator| {
                let stop = run_stop.clone();
                async move { stop.cancelled().await }
            })
            .on_finish(move |_during_init: bool| {
                let stop = stop.clone();
                async move { stop.cancel() }
            })
            .on_connect(move |connection: ServerConnection| {
                let out = Arc::clone(&on_connect);
                async move {
                    let handle = connection.downcast_ref::<&'static str>().copied().unwrap_or("?");
                    out.put(
                        Msg::new()
                            .with("event", "serverConnected")
                            .and_then(|m| m.with("block", tag))
                            .and_then(|m| m.with("handle", handle))
                            .unwrap(),
                    );
                }
            })
            .on_disconnect(move || {
                let out = Arc::clone(&on_disconnect);
                async move {
                    out.put(
                        Msg::new()
                            .with("event", "serverDisconnected")
                            .and_then(|m| m.with("block", tag))
                            .unwrap(),
                    );
                }
            })
    }
}

/// Block whose `finish` completes only once `gate` is released.
fn gated(
    journal: Journal,
    tag: &'static str,
    gate: CancellationToken,
) -> impl Fn() -> Block + Send + Sync + 'static {
    move || {
        let stop = CancellationToken::new();
        let run_stop = stop.clone();
        let (journal, gate) = (Arc::clone(&journal), gate.clone());

        Block::new()
            .on_init(|_conf: ConfFactory| async { Ok(()) })
            .on_run(move |_me: Communicator| {
                let stop = run_stop.clone();
                async move { stop.cancelled().await }
            })
            .on_finish(move |during_init: bool| {
                let (journal, gate, stop) = (Arc::clone(&journal), gate.clone(), stop.clone());
                async move {
                    gate.cancelled().await;
                    record(&journal, format!("finish({during_init}) {tag}"));
                    stop.cancel();
                }
            })
    }
}

fn quiet_finisher() -> ConfFactory {
    Arc::new(MapConfig::new().with(FINISHER_NAME, json!({"signals": false})))
}

fn three_probes(journal: &Journal) -> BlockFactories {
    BlockFactories::with_builtins()
        .with("A", probe(Arc::clone(journal), "A", false))
        .with("B", probe(Arc::clone(journal), "B", false))
        .with("C", probe(Arc::clone(journal), "C", false))
}

fn three_descriptors() -> Vec<BlockDescriptor> {
    vec![
        BlockDescriptor::new("A", "a"),
        BlockDescriptor::new("B", "b"),
        BlockDescriptor::new("C", "c"),
    ]
}

async fn prepared(runtime: Runtime) -> (Launch, ShootDown) {
    match runtime.prepare().await {
        Ok(pair) => pair,
        Err(e) => panic!("prepare failed: {e}"),
    }
}

async fn within<F: std::future::Future>(what: &str, fut: F) -> F::Output {
    match tokio::time::timeout(Duration::from_secs(5), fut).await {
        Ok(out) => out,
        Err(_) => panic!("timed out: {what}"),
    }
}

async fn wait_for(journal: &Journal, entry: &str) {
    within(entry, async {
        while count(journal, entry) == 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn finisher_trigger_finishes_every_block_once_in_reverse() {
    let journal: Journal = Arc::default();
    let runtime = Runtime::builder(Config::default())
        .with_factories(three_probes(&journal))
        .with_config_source(quiet_finisher())
        .with_blocks(three_descriptors())
        .build();

    let (launch, shoot_down) = prepared(runtime).await;
    assert_eq!(shoot_down.phase(), Phase::Initialized);
    let launched = tokio::spawn(launch.launch());
    wait_for(&journal, "run C").await;
    assert_eq!(shoot_down.phase(), Phase::Running);

    let finisher = shoot_down
        .communicator()
        .and_then(|head| head.communicator(FINISHER_RESPONSIBILITY))
        .unwrap();
    assert!(finisher.send(Msg::new()));

    within("launch", launched).await.unwrap();
    assert_eq!(shoot_down.phase(), Phase::Finished);

    let finishes: Vec<String> = entries(&journal)
        .into_iter()
        .filter(|e| e.starts_with("finish"))
        .collect();
    assert_eq!(finishes, ["finish(false) C", "finish(false) B", "finish(false) A"]);
    assert_eq!(
        entries(&journal)[..3],
        ["init A".to_string(), "init B".into(), "init C".into()]
    );
}

#[tokio::test]
async fn launch_waits_for_every_finish_whatever_the_completion_order() {
    let journal: Journal = Arc::default();
    let gate = CancellationToken::new();
    let factories = BlockFactories::with_builtins()
        .with("stopper", probe(Arc::clone(&journal), "F", false))
        .with("A", probe(Arc::clone(&journal), "A", false))
        .with("B", probe(Arc::clone(&journal), "B", false))
        .with("C", gated(Arc::clone(&journal), "C", gate.clone()));
    let runtime = Runtime::builder(Config::default())
        .with_factories(factories)
        .with_finisher(BlockDescriptor::new("stopper", "stopper"))
        .with_blocks(three_descriptors())
        .build();

    let (launch, shoot_down) = prepared(runtime).await;
    let launched = tokio::spawn(launch.launch());
    wait_for(&journal, "run A").await;

    // C is finished first but completes last
    let shooter = {
        let shoot_down = shoot_down.clone();
        tokio::spawn(async move { shoot_down.shoot_down().await })
    };
    for tag in ["B", "A", "F"] {
        wait_for(&journal, &format!("finish(false) {tag}")).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!launched.is_finished());
    assert!(!shooter.is_finished());
    assert_eq!(shoot_down.phase(), Phase::Finishing);
    assert_eq!(count(&journal, "finish(false) C"), 0);

    gate.cancel();
    within("launch", launched).await.unwrap();
    within("shoot down", shooter).await.unwrap();

    assert_eq!(shoot_down.phase(), Phase::Finished);
    for tag in ["A", "B", "C", "F"] {
        assert_eq!(count(&journal, &format!("finish(false) {tag}")), 1, "block {tag}");
    }
    let finishes: Vec<String> = entries(&journal)
        .into_iter()
        .filter(|e| e.starts_with("finish"))
        .collect();
    assert_eq!(finishes.last().map(String::as_str), Some("finish(false) C"));
}

#[tokio::test]
async fn init_failure_rolls_back_initialized_blocks() {
    let journal: Journal = Arc::default();
    let factories = BlockFactories::with_builtins()
        .with("A", probe(Arc::clone(&journal), "A", false))
        .with("B", probe(Arc::clone(&journal), "B", false))
        .with("C", probe(Arc::clone(&journal), "C", true));
    let runtime = Runtime::builder(Config::default())
        .with_factories(factories)
        .with_config_source(quiet_finisher())
        .with_blocks(three_descriptors())
        .build();

    let err = runtime.prepare().await.err().unwrap();
    assert_eq!(err.as_label(), "runtime_init_failed");
    assert_eq!(err.block(), ("C", "c"));
    assert_eq!(err.to_string(), "init of [C,c] failed with error C refused");
    assert_eq!(
        entries(&journal),
        ["init A", "init B", "init C", "finish(true) B", "finish(true) A"]
    );
}

#[tokio::test]
async fn unknown_block_fails_prepare_without_init() {
    let journal: Journal = Arc::default();
    let runtime = Runtime::builder(Config::default())
        .with_factories(three_probes(&journal))
        .with_config_source(quiet_finisher())
        .with_block(BlockDescriptor::new("A", "a"))
        .with_block(BlockDescriptor::new("Z", "z"))
        .build();

    let err = runtime.prepare().await.err().unwrap();
    assert_eq!(err.as_label(), "runtime_unknown_block");
    assert!(entries(&journal).is_empty());
}

#[tokio::test]
async fn server_callbacks_without_connector_are_rejected() {
    let out = Arc::new(Queue::new());
    let runtime = Runtime::builder(Config::default())
        .with_factories(BlockFactories::with_builtins().with("L", listener(out, "L")))
        .with_config_source(quiet_finisher())
        .with_block(BlockDescriptor::new("L", "l"))
        .build();

    let err = runtime.prepare().await.err().unwrap();
    assert_eq!(err.as_label(), "runtime_connector_unsupported");
    assert_eq!(err.block(), ("L", "l"));
}

#[tokio::test]
async fn shoot_down_twice_after_launch_finishes_once() {
    let journal: Journal = Arc::default();
    let runtime = Runtime::builder(Config::default())
        .with_factories(three_probes(&journal))
        .with_config_source(quiet_finisher())
        .with_blocks(three_descriptors())
        .build();

    let (launch, shoot_down) = prepared(runtime).await;
    let launched = tokio::spawn(launch.launch());
    wait_for(&journal, "run A").await;

    let again = shoot_down.clone();
    within("first shoot down", shoot_down.shoot_down()).await;
    within("second shoot down", again.shoot_down()).await;
    within("launch", launched).await.unwrap();

    for tag in ["A", "B", "C"] {
        assert_eq!(count(&journal, &format!("finish(false) {tag}")), 1);
    }
}

#[tokio::test]
async fn shoot_down_before_launch_skips_run() {
    let journal: Journal = Arc::default();
    let runtime = Runtime::builder(Config::default())
        .with_factories(three_probes(&journal))
        .with_config_source(quiet_finisher())
        .with_blocks(three_descriptors())
        .build();

    let (launch, shoot_down) = prepared(runtime).await;
    within("shoot down", shoot_down.shoot_down()).await;
    within("shoot down again", shoot_down.shoot_down()).await;
    within("launch", launch.launch()).await;

    assert_eq!(shoot_down.phase(), Phase::Finished);
    let log = entries(&journal);
    assert!(log.iter().all(|e| !e.starts_with("run")));
    assert_eq!(
        log[3..],
        [
            "finish(false) C".to_string(),
            "finish(false) B".into(),
            "finish(false) A".into()
        ]
    );
}

#[tokio::test]
async fn messages_reach_blocks_by_responsibility() {
    let journal: Journal = Arc::default();
    let echoed = Arc::new(Queue::new());
    let factories = three_probes(&journal).with(ECHO_NAME, echo_factory(Arc::clone(&echoed)));
    let runtime = Runtime::builder(Config::default())
        .with_factories(factories)
        .with_config_source(quiet_finisher())
        .with_blocks(three_descriptors())
        .with_block(BlockDescriptor::new(ECHO_NAME, "mirror"))
        .build();

    let (launch, shoot_down) = prepared(runtime).await;
    let launched = tokio::spawn(launch.launch());

    let head = shoot_down.communicator().unwrap();
    let b = head.communicator("b").unwrap();
    for text in ["one", "two", "three"] {
        assert!(b.send(Msg::new().with("text", text).unwrap()));
    }
    let mirror = b.communicator("mirror").unwrap();
    assert!(mirror.send(Msg::new().with("text", "hello").unwrap()));
    assert!(b.communicator("nobody").is_none());

    let got = within("echo", echoed.get()).await.unwrap();
    assert_eq!(got.get_str("text"), Some("hello"));
    wait_for(&journal, "msg B three").await;
    let delivered: Vec<String> = entries(&journal)
        .into_iter()
        .filter(|e| e.starts_with("msg B"))
        .collect();
    assert_eq!(delivered, ["msg B one", "msg B two", "msg B three"]);

    within("shoot down", shoot_down.shoot_down()).await;
    within("launch", launched).await.unwrap();

    assert!(!b.send(Msg::new()));
    assert!(!mirror.send(Msg::new()));
    assert!(echoed.try_get().is_none());
}

#[tokio::test(start_paused = true)]
async fn connector_reports_each_transition_once() {
    let plugin = Arc::new(DummyConnector::new());
    let out = Arc::new(Queue::new());
    let factories = BlockFactories::with_builtins()
        .with("L1", listener(Arc::clone(&out), "l1"))
        .with("L2", listener(Arc::clone(&out), "l2"))
        .with("L3", listener(Arc::clone(&out), "l3"));
    let runtime = Runtime::builder(Config {
        connector_interval: Duration::from_secs(1),
    })
    .with_factories(factories)
    .with_config_source(quiet_finisher())
    .with_connector(plugin.clone())
    .with_blocks([
        BlockDescriptor::new("L1", "l1"),
        BlockDescriptor::new("L2", "l2"),
        BlockDescriptor::new("L3", "l3"),
    ])
    .build();

    let (launch, shoot_down) = prepared(runtime).await;
    let launched = tokio::spawn(launch.launch());

    // server down: failed attempts stay silent
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(out.try_get().is_none());

    plugin.set_state(true);
    let mut blocks = Vec::new();
    for _ in 0..3 {
        let msg = within("connected", out.get()).await.unwrap();
        assert_eq!(msg.get_str("event"), Some("serverConnected"));
        assert_eq!(msg.get_str("handle"), Some("connected"));
        blocks.push(msg.get_str("block").unwrap().to_string());
    }
    blocks.sort();
    assert_eq!(blocks, ["l1", "l2", "l3"]);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(out.try_get().is_none(), "duplicate connect notification");

    plugin.set_state(false);
    let mut blocks = Vec::new();
    for _ in 0..3 {
        let msg = within("disconnected", out.get()).await.unwrap();
        assert_eq!(msg.get_str("event"), Some("serverDisconnected"));
        blocks.push(msg.get_str("block").unwrap().to_string());
    }
    blocks.sort();
    assert_eq!(blocks, ["l1", "l2", "l3"]);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(out.try_get().is_none(), "duplicate disconnect notification");

    within("shoot down", shoot_down.shoot_down()).await;
    within("launch", launched).await.unwrap();
    assert_eq!(plugin.disconnect_calls(), 1);
}

#[tokio::test]
async fn runner_stops_and_waits() {
    let journal: Journal = Arc::default();
    let runtime = Runtime::builder(Config::default())
        .with_factories(three_probes(&journal))
        .with_config_source(quiet_finisher())
        .with_blocks(three_descriptors())
        .build();

    let runner = match Runner::start(runtime).await {
        Ok(runner) => runner,
        Err(e) => panic!("start failed: {e}"),
    };
    wait_for(&journal, "run C").await;
    assert!(!runner.is_finished());

    within("stop", runner.stop()).await;
    within("wait", runner.wait()).await;
    assert!(runner.is_finished());
    assert_eq!(runner.shoot_down().phase(), Phase::Finished);

    within("stop again", runner.stop()).await;
    assert_eq!(count(&journal, "finish(false) A"), 1);
}
