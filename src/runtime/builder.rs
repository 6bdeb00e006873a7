use std::sync::Arc;

use crate::blocks::{BlockDescriptor, BlockFactories, default_factories};
use crate::config::{ConfFactory, Config, NoConfig};
use crate::core::{Blueprint, ConnectorSetup, Orchestrator};
use crate::error::RuntimeError;
use crate::server::ServerConnector;

use super::launch::{Launch, ShootDown};

/// Builder for a [`Runtime`].
pub struct RuntimeBuilder {
    cfg: Config,
    app_blocks: Vec<BlockDescriptor>,
    finisher: BlockDescriptor,
    conf: Option<ConfFactory>,
    connector: Option<Arc<dyn ServerConnector>>,
    factories: Option<BlockFactories>,
}

impl RuntimeBuilder {
    /// Creates a builder with the given runtime configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            app_blocks: Vec::new(),
            finisher: BlockDescriptor::finisher(),
            conf: None,
            connector: None,
            factories: None,
        }
    }

    /// Appends application blocks.
    ///
    /// Their order is the order of creation, initialization and `run` start;
    /// shutdown goes the other way round.
    pub fn with_blocks(mut self, blocks: impl IntoIterator<Item = BlockDescriptor>) -> Self {
        self.app_blocks.extend(blocks);
        self
    }

    /// Appends one application block.
    pub fn with_block(mut self, block: BlockDescriptor) -> Self {
        self.app_blocks.push(block);
        self
    }

    /// Replaces the finisher descriptor (default: [`BlockDescriptor::finisher`]).
    ///
    /// Use it to plug in an own shutdown-trigger block.
    pub fn with_finisher(mut self, finisher: BlockDescriptor) -> Self {
        self.finisher = finisher;
        self
    }

    /// Sets the configuration source handed to every block's `init`
    /// (default: [`NoConfig`]).
    pub fn with_config_source(mut self, conf: ConfFactory) -> Self {
        self.conf = Some(conf);
        self
    }

    /// Adds the connector block, driving `plugin` every `connector_interval`.
    pub fn with_connector(mut self, plugin: Arc<dyn ServerConnector>) -> Self {
        self.connector = Some(plugin);
        self
    }

    /// Uses an explicit factory table instead of the process-wide registry.
    pub fn with_factories(mut self, factories: BlockFactories) -> Self {
        self.factories = Some(factories);
        self
    }

    /// Builds the runtime. Nothing is created or initialized yet.
    pub fn build(self) -> Runtime {
        Runtime {
            cfg: self.cfg,
            app_blocks: self.app_blocks,
            finisher: self.finisher,
            conf: self.conf.unwrap_or_else(|| Arc::new(NoConfig)),
            connector: self.connector,
            factories: self.factories.unwrap_or_else(default_factories),
        }
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// A set of blocks ready to be prepared.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use blockvisor::{
///     BlockDescriptor, Config, DummyConnector, ECHO_NAME, Queue, Runtime, echo_factory,
///     register_block_factory,
/// };
///
/// # async fn demo() -> Result<(), blockvisor::RuntimeError> {
/// register_block_factory(ECHO_NAME, echo_factory(Arc::new(Queue::new())));
///
/// let blocks = BlockDescriptor::list_from_json(r#"[{"Name":"echo","Responsibility":"e1"}]"#)
///     .expect("valid descriptor list");
/// let runtime = Runtime::builder(Config::default())
///     .with_blocks(blocks)
///     .with_connector(Arc::new(DummyConnector::new()))
///     .build();
///
/// let (launch, shoot_down) = runtime.prepare().await?;
/// tokio::spawn(async move { shoot_down.shoot_down().await });
/// launch.launch().await;
/// # Ok(())
/// # }
/// ```
pub struct Runtime {
    cfg: Config,
    app_blocks: Vec<BlockDescriptor>,
    finisher: BlockDescriptor,
    conf: ConfFactory,
    connector: Option<Arc<dyn ServerConnector>>,
    factories: BlockFactories,
}

impl Runtime {
    /// Starts building a runtime.
    pub fn builder(cfg: Config) -> RuntimeBuilder {
        RuntimeBuilder::new(cfg)
    }

    /// Descriptors of every block the orchestrator will create, in order:
    /// finisher, connector (if a plugin is configured), application blocks.
    pub fn descriptors(&self) -> Vec<BlockDescriptor> {
        let mut list = Vec::with_capacity(self.app_blocks.len() + 2);
        list.push(self.finisher.clone());
        if self.connector.is_some() {
            list.push(BlockDescriptor::connector());
        }
        list.extend(self.app_blocks.iter().cloned());
        list
    }

    /// Creates and initializes every block.
    ///
    /// On failure, blocks initialized so far are finished in reverse order and the error
    /// names the failing block. On success, returns the [`Launch`] / [`ShootDown`] pair.
    pub async fn prepare(self) -> Result<(Launch, ShootDown), RuntimeError> {
        let blueprint = Blueprint {
            descriptors: self.descriptors(),
            factories: self.factories,
            conf: self.conf,
            connector: self.connector.map(|plugin| ConnectorSetup {
                plugin,
                interval: self.cfg.connector_interval_clamped(),
            }),
        };

        let orchestrator = Arc::new(Orchestrator::new());
        orchestrator.initialize(blueprint).await?;

        Ok((
            Launch::new(Arc::clone(&orchestrator)),
            ShootDown::new(orchestrator),
        ))
    }
}
