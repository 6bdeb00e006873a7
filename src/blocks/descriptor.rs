//! # Block identity.
//!
//! A [`BlockDescriptor`] pairs a **name** (behavior type, resolved through
//! [`BlockFactories`](crate::BlockFactories)) with a **responsibility** (one running
//! instance). Several blocks may share a name; responsibilities are unique within a run.
//!
//! Descriptor lists are usually kept in configuration; they deserialize from JSON:
//! ```rust
//! use blockvisor::BlockDescriptor;
//!
//! let list = BlockDescriptor::list_from_json(
//!     r#"[{"Name": "dumb", "Responsibility": "1"}, {"Name": "dumb", "Responsibility": "2"}]"#,
//! ).unwrap();
//! assert_eq!(list[1].responsibility(), "2");
//! ```

use serde::{Deserialize, Serialize};

/// Responsibility reserved for the orchestrator.
pub const INITIATOR_RESPONSIBILITY: &str = "initiator";
/// Name of the built-in finisher block.
pub const FINISHER_NAME: &str = "finisher";
/// Default responsibility of the finisher block.
pub const FINISHER_RESPONSIBILITY: &str = "finisher";
/// Name of the built-in connector block.
pub const CONNECTOR_NAME: &str = "connector";
/// Responsibility of the connector block.
pub const CONNECTOR_RESPONSIBILITY: &str = "connector";

/// Immutable `(name, responsibility)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockDescriptor {
    name: String,
    responsibility: String,
}

impl BlockDescriptor {
    /// Creates a descriptor.
    pub fn new(name: impl Into<String>, responsibility: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responsibility: responsibility.into(),
        }
    }

    /// Behavior type; key into the factory registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Running instance identifier.
    pub fn responsibility(&self) -> &str {
        &self.responsibility
    }

    /// Descriptor of the built-in finisher.
    pub fn finisher() -> Self {
        Self::new(FINISHER_NAME, FINISHER_RESPONSIBILITY)
    }

    /// Descriptor of the built-in connector.
    pub fn connector() -> Self {
        Self::new(CONNECTOR_NAME, CONNECTOR_RESPONSIBILITY)
    }

    pub(crate) fn initiator() -> Self {
        Self::new(INITIATOR_RESPONSIBILITY, INITIATOR_RESPONSIBILITY)
    }

    /// Parses a JSON array of `{"Name": .., "Responsibility": ..}` objects.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }
}
