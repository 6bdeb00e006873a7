//! # Message envelope exchanged between blocks.
//!
//! A [`Msg`] is a string-keyed bag of [`Value`]s. Blocks agree among themselves on what
//! they put inside; the runtime only reads and writes keys starting with
//! [`RESERVED_PREFIX`] and never inspects anything else.
//!
//! ## Reserved keys
//! | Key | Set by | Meaning |
//! |-----|--------|---------|
//! | `__name` | runtime | lifecycle message name (`__finish`, `__finished`, ...) |
//! | `__resp` | runtime | responsibility of the block a `__finished` refers to |
//! | `__connector` | runtime | connector plugin handle (setup message) |
//! | `__timeout` | runtime | connector polling interval (setup message) |
//! | `__connection` | runtime | server connection handle (`__connected`) |
//!
//! ## Example
//! ```rust
//! use blockvisor::{Msg, Value};
//!
//! let msg = Msg::new()
//!     .with("topic", "alerts").unwrap()
//!     .with("retries", 3).unwrap();
//!
//! assert_eq!(msg.get_str("topic"), Some("alerts"));
//! assert!(msg.name().is_none());
//! assert!(Msg::new().with("__name", "x").is_err());
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::MessageError;

/// Prefix of every runtime-owned key.
pub const RESERVED_PREFIX: &str = "__";

/// Key holding the lifecycle message name.
pub const NAME_KEY: &str = "__name";
/// Key holding the responsibility a `__finished` message refers to.
pub const RESP_KEY: &str = "__resp";
/// Key holding the connector plugin handle.
pub const CONNECTOR_KEY: &str = "__connector";
/// Key holding the connector polling interval.
pub const TIMEOUT_KEY: &str = "__timeout";
/// Key holding the server connection handle.
pub const CONNECTION_KEY: &str = "__connection";

/// Request to shut the process down.
pub const FINISH_MSG: &str = "__finish";
/// One block completed its finish.
pub const FINISHED_MSG: &str = "__finished";
/// The connector established a server connection.
pub const SERVER_CONNECTED_MSG: &str = "__connected";
/// The connector lost the server connection.
pub const SERVER_DISCONNECTED_MSG: &str = "__disconnected";
/// Connector setup (plugin handle + polling interval).
pub const SETUP_MSG: &str = "__setup";

/// A single message field.
#[derive(Clone)]
pub enum Value {
    /// Explicit absence.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Str(Arc<str>),
    /// Time span.
    Duration(Duration),
    /// Structured payload.
    Json(serde_json::Value),
    /// Opaque shared object (connections, plugin handles, channels).
    Handle(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wraps any shareable object as an opaque handle.
    pub fn handle<T: Any + Send + Sync>(value: T) -> Self {
        Value::Handle(Arc::new(value))
    }

    /// Returns the text, if this is a [`Value::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the flag, if this is a [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is a [`Value::Int`].
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the number, if this is a [`Value::Float`] or [`Value::Int`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Returns the time span, if this is a [`Value::Duration`].
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Value::Duration(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the payload, if this is a [`Value::Json`].
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the shared object, if this is a [`Value::Handle`].
    pub fn as_handle(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        match self {
            Value::Handle(h) => Some(h),
            _ => None,
        }
    }

    /// Borrows the handle as `T`, if this is a [`Value::Handle`] holding a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_handle().and_then(|h| h.downcast_ref::<T>())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::Duration(d) => f.debug_tuple("Duration").field(d).finish(),
            Value::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Value::Handle(_) => f.write_str("Handle(..)"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Value::Duration(d)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

/// Schema-less message envelope.
///
/// Application code may use any key that does not start with [`RESERVED_PREFIX`];
/// reserved keys are written only by the runtime.
#[derive(Clone, Debug, Default)]
pub struct Msg {
    fields: HashMap<String, Value>,
}

impl Msg {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `key` belongs to the runtime.
    #[inline]
    pub fn is_reserved(key: &str) -> bool {
        key.starts_with(RESERVED_PREFIX)
    }

    /// Inserts an application field, returning the previous value under `key`.
    ///
    /// Fails with [`MessageError::ReservedKey`] for runtime-owned keys.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, MessageError> {
        let key = key.into();
        if Self::is_reserved(&key) {
            return Err(MessageError::ReservedKey { key });
        }
        Ok(self.fields.insert(key, value.into()))
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, MessageError> {
        self.insert(key, value)?;
        Ok(self)
    }

    /// Returns the field stored under `key` (reserved keys included).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the text stored under `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Removes an application field.
    ///
    /// Reserved keys are left untouched and `None` is returned for them.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if Self::is_reserved(key) {
            return None;
        }
        self.fields.remove(key)
    }

    /// Returns true if the message has a field under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Number of fields, reserved ones included.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the message has no fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over the application fields (reserved keys skipped).
    pub fn payload(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .filter(|(k, _)| !Self::is_reserved(k))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Lifecycle message name (`__name`), if present.
    pub fn name(&self) -> Option<&str> {
        self.get_str(NAME_KEY)
    }

    /// Responsibility carried by a `__finished` message.
    pub fn responsibility(&self) -> Option<&str> {
        self.get_str(RESP_KEY)
    }

    /// Asks the orchestrator to shut the process down.
    ///
    /// Send it to the `"initiator"` communicator; a second request while
    /// shutdown is already underway is ignored.
    #[must_use]
    pub fn finish_request() -> Self {
        Self::reserved(FINISH_MSG)
    }

    /// Reports the server connection handle of a fresh connection.
    #[must_use]
    pub fn server_connected(connection: crate::ServerConnection) -> Self {
        let mut msg = Self::reserved(SERVER_CONNECTED_MSG);
        msg.set_reserved(CONNECTION_KEY, Value::Handle(connection));
        msg
    }

    /// Reports loss of the server connection.
    #[must_use]
    pub fn server_disconnected() -> Self {
        Self::reserved(SERVER_DISCONNECTED_MSG)
    }

    /// Connection handle carried by a `__connected` message.
    pub fn connection(&self) -> Option<crate::ServerConnection> {
        self.get(CONNECTION_KEY)
            .and_then(Value::as_handle)
            .map(Arc::clone)
    }

    pub(crate) fn finished(responsibility: &str) -> Self {
        let mut msg = Self::reserved(FINISHED_MSG);
        msg.set_reserved(RESP_KEY, Value::from(responsibility));
        msg
    }

    pub(crate) fn reserved(name: &'static str) -> Self {
        let mut msg = Self::new();
        msg.set_reserved(NAME_KEY, Value::from(name));
        msg
    }

    #[inline]
    pub(crate) fn set_reserved(&mut self, key: &'static str, value: Value) {
        debug_assert!(Self::is_reserved(key));
        self.fields.insert(key.to_string(), value);
    }
}
