//! Error types used by the blockvisor runtime and by blocks.
//!
//! - [`RegistryError`]: wiring-time faults while registering block factories.
//! - [`RuntimeError`]: failures of block creation, validation or initialization,
//!   surfaced by [`Runtime::prepare`](crate::Runtime::prepare).
//! - [`BlockError`]: what a block's `init` callback returns.
//! - [`ConfigError`]: configuration lookups through a [`ConfigSource`](crate::ConfigSource).
//! - [`ConnectorError`]: a failed server connect attempt (retried silently by the connector).
//! - [`MessageError`]: application code touching a runtime-owned message key.
//!
//! Every enum provides `as_label()`, a short stable snake_case label for logs.
//!
//! Runtime communication (`send`, `notify_*`) never produces errors: it returns `bool`,
//! and `false` is a routine "not delivered".

use thiserror::Error;

/// # Errors raised while registering block factories.
///
/// Registration happens while the process is being wired, so the panicking
/// wrappers ([`BlockFactories::register`](crate::BlockFactories::register),
/// [`register_block_factory`](crate::register_block_factory)) turn these into panics.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Factory registered under an empty name.
    #[error("block factory name is empty")]
    EmptyName,

    /// A factory with this name already exists.
    #[error("block factory {name:?} already registered")]
    AlreadyRegistered {
        /// The duplicated name.
        name: String,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::EmptyName => "registry_empty_name",
            RegistryError::AlreadyRegistered { .. } => "registry_already_registered",
        }
    }
}

/// # Errors produced while preparing the runtime.
///
/// Every variant identifies the failing block by `(name, responsibility)`.
/// Any of them aborts startup: blocks initialized so far are finished in reverse order
/// before the error is returned.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No factory is registered under the descriptor's name.
    #[error("creation of block [name: {name} resp: {responsibility}] failed: unknown block name")]
    UnknownBlock {
        /// Block name (behavior type).
        name: String,
        /// Block responsibility (instance).
        responsibility: String,
    },

    /// The factory produced a block without one of the mandatory callbacks.
    #[error("block [name: {name} resp: {responsibility}] has no {callback} callback")]
    MissingCallback {
        /// Block name (behavior type).
        name: String,
        /// Block responsibility (instance).
        responsibility: String,
        /// Which callback is missing (`init`, `run` or `finish`).
        callback: &'static str,
    },

    /// The block wants server notifications but the runtime has no connector plugin.
    #[error(
        "block [name: {name} resp: {responsibility}] has connect/disconnect callbacks but no connector is configured"
    )]
    ConnectorCallbacksUnsupported {
        /// Block name (behavior type).
        name: String,
        /// Block responsibility (instance).
        responsibility: String,
    },

    /// Two descriptors share one responsibility.
    #[error("responsibility {responsibility:?} is used by more than one block (second: {name})")]
    DuplicateResponsibility {
        /// Name of the second block claiming the responsibility.
        name: String,
        /// The duplicated responsibility.
        responsibility: String,
    },

    /// A descriptor claims the orchestrator's reserved responsibility.
    #[error("block [name: {name} resp: {responsibility}] uses a reserved responsibility")]
    ReservedResponsibility {
        /// Block name (behavior type).
        name: String,
        /// The reserved responsibility.
        responsibility: String,
    },

    /// The block's `init` callback returned an error.
    #[error("init of [{name},{responsibility}] failed with error {source}")]
    InitFailed {
        /// Block name (behavior type).
        name: String,
        /// Block responsibility (instance).
        responsibility: String,
        /// Error returned by `init`.
        #[source]
        source: BlockError,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use blockvisor::RuntimeError;
    ///
    /// let err = RuntimeError::UnknownBlock { name: "x".into(), responsibility: "y".into() };
    /// assert_eq!(err.as_label(), "runtime_unknown_block");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::UnknownBlock { .. } => "runtime_unknown_block",
            RuntimeError::MissingCallback { .. } => "runtime_missing_callback",
            RuntimeError::ConnectorCallbacksUnsupported { .. } => "runtime_connector_unsupported",
            RuntimeError::DuplicateResponsibility { .. } => "runtime_duplicate_responsibility",
            RuntimeError::ReservedResponsibility { .. } => "runtime_reserved_responsibility",
            RuntimeError::InitFailed { .. } => "runtime_init_failed",
        }
    }

    /// Returns the `(name, responsibility)` pair of the block this error is about.
    pub fn block(&self) -> (&str, &str) {
        match self {
            RuntimeError::UnknownBlock {
                name,
                responsibility,
            }
            | RuntimeError::MissingCallback {
                name,
                responsibility,
                ..
            }
            | RuntimeError::ConnectorCallbacksUnsupported {
                name,
                responsibility,
            }
            | RuntimeError::DuplicateResponsibility {
                name,
                responsibility,
            }
            | RuntimeError::ReservedResponsibility {
                name,
                responsibility,
            }
            | RuntimeError::InitFailed {
                name,
                responsibility,
                ..
            } => (name, responsibility),
        }
    }
}

/// # Errors returned by a block's `init` callback.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BlockError {
    /// The block could not obtain its configuration.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// Any other initialization failure.
    #[error("{error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },
}

impl BlockError {
    /// Shorthand for [`BlockError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        BlockError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BlockError::Config(_) => "block_config",
            BlockError::Fail { .. } => "block_failed",
        }
    }
}

/// # Errors produced by configuration lookups.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The source has no configuration under this name.
    #[error("configuration {name:?} not found")]
    NotFound {
        /// Logical configuration name.
        name: String,
    },

    /// The configuration exists but does not fit the requested type.
    #[error("configuration {name:?} is invalid: {source}")]
    Invalid {
        /// Logical configuration name.
        name: String,
        /// Deserialization failure.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::NotFound { .. } => "config_not_found",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }
}

/// # Errors returned by a [`ServerConnector`](crate::ServerConnector) plugin.
///
/// The connector block retries on its next tick; these never reach the façade.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// The connect attempt failed.
    #[error("connection failed: {reason}")]
    ConnectFailed {
        /// Plugin-specific reason.
        reason: String,
    },
}

impl ConnectorError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectorError::ConnectFailed { .. } => "connector_connect_failed",
        }
    }
}

/// # Errors produced when building a [`Msg`](crate::Msg).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Keys starting with the reserved prefix belong to the runtime.
    #[error("message key {key:?} uses the reserved prefix")]
    ReservedKey {
        /// The rejected key.
        key: String,
    },
}

impl MessageError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            MessageError::ReservedKey { .. } => "message_reserved_key",
        }
    }
}
