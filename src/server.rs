//! # Server connector plugin boundary.
//!
//! The runtime does not know what "the server" is. The embedding application supplies a
//! [`ServerConnector`] plugin; the built-in connector block polls it and turns its state
//! changes into `on_connect` / `on_disconnect` callbacks of application blocks.
//!
//! The connection itself is an opaque [`ServerConnection`] handle that blocks downcast to
//! whatever type the plugin hands out.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::config::ConfFactory;
use crate::error::ConnectorError;

/// Opaque server connection handed to `on_connect` callbacks.
pub type ServerConnection = Arc<dyn Any + Send + Sync>;

/// # Plugin connecting the process to its server.
///
/// Reconnect contract: calling [`connect`](ServerConnector::connect) again while already
/// connected (and the connection is not broken) must return the same connection value and
/// no error.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use blockvisor::{ConfFactory, ConnectorError, ServerConnection, ServerConnector};
///
/// struct Always(ServerConnection);
///
/// #[async_trait]
/// impl ServerConnector for Always {
///     async fn connect(&self, _conf: &ConfFactory) -> Result<ServerConnection, ConnectorError> {
///         Ok(Arc::clone(&self.0))
///     }
///     async fn is_connected(&self) -> bool { true }
///     async fn disconnect(&self) {}
/// }
/// ```
#[async_trait]
pub trait ServerConnector: Send + Sync + 'static {
    /// Connects (or returns the live connection).
    async fn connect(&self, conf: &ConfFactory) -> Result<ServerConnection, ConnectorError>;

    /// False if never connected or the connection broke.
    async fn is_connected(&self) -> bool;

    /// Closes a live connection.
    async fn disconnect(&self);
}

/// In-memory plugin for tests and debugging.
///
/// The connection state is a flag flipped with [`set_state`](DummyConnector::set_state):
/// `connect` fails while it is false and returns the same `"connected"` handle while true.
#[derive(Debug)]
pub struct DummyConnector {
    connected: AtomicBool,
    connection: ServerConnection,
    disconnects: AtomicUsize,
}

impl DummyConnector {
    /// Creates a disconnected plugin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            connection: Arc::new("connected"),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Simulates the server going up (`true`) or down (`false`).
    pub fn set_state(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// How many times `disconnect` was called.
    pub fn disconnect_calls(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl Default for DummyConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServerConnector for DummyConnector {
    async fn connect(&self, _conf: &ConfFactory) -> Result<ServerConnection, ConnectorError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ConnectorError::ConnectFailed {
                reason: "connection failed".into(),
            });
        }
        Ok(Arc::clone(&self.connection))
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }
}
