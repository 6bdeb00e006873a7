//! # Block factory registry.
//!
//! Maps a block **name** to a factory producing a fresh [`Block`] per descriptor.
//!
//! Two ways to use it:
//! - an explicit [`BlockFactories`] value handed to the runtime builder (tests, embedding);
//! - the process-wide registry, filled at wiring time with [`register_block_factory`] and
//!   snapshotted by [`default_factories`].
//!
//! Both start with the built-in `finisher` and `connector` factories.
//!
//! ## Rules
//! - Names are non-empty and unique; violations are wiring bugs and panic in the
//!   panicking helpers ([`BlockFactories::register`], [`register_block_factory`]).
//! - Creation validates the produced block (mandatory callbacks, connector callbacks).

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::blocks::block::BlockCallbacks;
use crate::blocks::{Block, BlockDescriptor, CONNECTOR_NAME, FINISHER_NAME};
use crate::builtin::{connector_factory, finisher_factory};
use crate::error::{RegistryError, RuntimeError};

/// Produces a fresh [`Block`] each time it is called.
pub type BlockFactory = Arc<dyn Fn() -> Block + Send + Sync>;

/// Name → factory table.
#[derive(Clone, Default)]
pub struct BlockFactories {
    factories: HashMap<String, BlockFactory>,
}

impl BlockFactories {
    /// Creates an empty table (no built-ins).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table holding the built-in `finisher` and `connector` factories.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut me = Self::new();
        me.factories
            .insert(FINISHER_NAME.to_string(), Arc::new(finisher_factory));
        me.factories
            .insert(CONNECTOR_NAME.to_string(), Arc::new(connector_factory));
        me
    }

    /// Registers `factory` under `name`.
    pub fn try_register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Block + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.factories.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered { name });
        }
        self.factories.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Registers `factory` under `name`.
    ///
    /// # Panics
    /// On an empty or already registered name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Block + Send + Sync + 'static,
    {
        if let Err(e) = self.try_register(name, factory) {
            panic!("block factory registration failed: {e}");
        }
    }

    /// Builder form of [`register`](Self::register).
    ///
    /// # Panics
    /// On an empty or already registered name.
    #[must_use]
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Block + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// True if a factory exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Creates and validates the block for `descriptor`.
    pub(crate) fn create(
        &self,
        descriptor: &BlockDescriptor,
        connector_enabled: bool,
    ) -> Result<BlockCallbacks, RuntimeError> {
        let factory =
            self.factories
                .get(descriptor.name())
                .ok_or_else(|| RuntimeError::UnknownBlock {
                    name: descriptor.name().to_string(),
                    responsibility: descriptor.responsibility().to_string(),
                })?;
        factory().validate(descriptor, connector_enabled)
    }
}

static GLOBAL: Lazy<RwLock<BlockFactories>> =
    Lazy::new(|| RwLock::new(BlockFactories::with_builtins()));

/// Registers a factory in the process-wide registry.
///
/// Call while wiring the process, before the runtime is prepared.
///
/// # Panics
/// On an empty or already registered name.
pub fn register_block_factory<F>(name: impl Into<String>, factory: F)
where
    F: Fn() -> Block + Send + Sync + 'static,
{
    GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(name, factory);
}

/// Snapshot of the process-wide registry.
pub fn default_factories() -> BlockFactories {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
