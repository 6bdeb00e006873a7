//! # Runtime configuration and block configuration sources.
//!
//! Two separate things live here:
//! 1. [`Config`]: knobs of the runtime itself (connector polling interval).
//! 2. [`ConfigSource`] / [`ConfFactory`]: the boundary through which blocks obtain their own
//!    configuration by logical name. The runtime never interprets it; it only hands the same
//!    [`ConfFactory`] to every block's `init` and to the connector plugin's `connect`.
//!
//! Loading files or environment variables is the embedding application's job: implement
//! [`ConfigSource`] over whatever storage it uses. [`MapConfig`] covers tests and static tables.
//!
//! ## Sentinel values
//! - `connector_interval = 0s` → clamped to 1ms (a ticker cannot have a zero period)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::ConfigError;

/// Default polling interval of the connector block.
pub const DEFAULT_CONNECTOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Global configuration for the runtime.
///
/// ## Field semantics
/// - `connector_interval`: period of the connector's connect / health-check ticks
#[derive(Clone, Debug)]
pub struct Config {
    /// How often the connector block runs its current action (connect or check).
    ///
    /// Only used when a connector plugin is configured.
    pub connector_interval: Duration,
}

impl Config {
    /// Returns the connector interval clamped to a minimum of 1ms.
    #[inline]
    pub fn connector_interval_clamped(&self) -> Duration {
        self.connector_interval.max(Duration::from_millis(1))
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `connector_interval = 5s`
    fn default() -> Self {
        Self {
            connector_interval: DEFAULT_CONNECTOR_TIMEOUT,
        }
    }
}

/// Source of block configuration, addressed by logical name.
///
/// Implementations return raw JSON; blocks usually go through the typed helpers
/// `load` and `load_or_default` defined on `dyn ConfigSource`.
pub trait ConfigSource: Send + Sync + 'static {
    /// Returns the configuration stored under `name`.
    fn raw(&self, name: &str) -> Result<serde_json::Value, ConfigError>;
}

impl dyn ConfigSource {
    /// Deserializes the configuration stored under `name`.
    ///
    /// # Example
    /// ```
    /// use std::sync::Arc;
    /// use blockvisor::{ConfFactory, MapConfig};
    ///
    /// #[derive(serde::Deserialize)]
    /// struct Db { url: String }
    ///
    /// let conf: ConfFactory = Arc::new(MapConfig::new().with("db", serde_json::json!({"url": "x"})));
    /// let db: Db = conf.load("db").unwrap();
    /// assert_eq!(db.url, "x");
    /// ```
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T, ConfigError> {
        let raw = self.raw(name)?;
        serde_json::from_value(raw).map_err(|source| ConfigError::Invalid {
            name: name.to_string(),
            source,
        })
    }

    /// Like `load`, but a missing configuration yields `T::default()`.
    pub fn load_or_default<T: DeserializeOwned + Default>(
        &self,
        name: &str,
    ) -> Result<T, ConfigError> {
        match self.load(name) {
            Err(ConfigError::NotFound { .. }) => Ok(T::default()),
            other => other,
        }
    }
}

/// Shared handle to a [`ConfigSource`]; what block `init` callbacks receive.
pub type ConfFactory = Arc<dyn ConfigSource>;

/// Configuration source with nothing in it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoConfig;

impl ConfigSource for NoConfig {
    fn raw(&self, name: &str) -> Result<serde_json::Value, ConfigError> {
        Err(ConfigError::NotFound {
            name: name.to_string(),
        })
    }
}

/// In-memory configuration: logical name → JSON value.
///
/// Names are matched case-insensitively.
#[derive(Debug, Default, Clone)]
pub struct MapConfig {
    entries: HashMap<String, serde_json::Value>,
}

impl MapConfig {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the configuration stored under `name`.
    #[must_use]
    pub fn with(mut self, name: impl AsRef<str>, value: serde_json::Value) -> Self {
        self.entries.insert(name.as_ref().to_lowercase(), value);
        self
    }
}

impl ConfigSource for MapConfig {
    fn raw(&self, name: &str) -> Result<serde_json::Value, ConfigError> {
        self.entries
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| ConfigError::NotFound {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Probe {
        #[serde(default)]
        port: u16,
    }

    #[test]
    fn zero_interval_is_clamped() {
        let cfg = Config {
            connector_interval: Duration::ZERO,
        };
        assert_eq!(cfg.connector_interval_clamped(), Duration::from_millis(1));
        assert_eq!(
            Config::default().connector_interval_clamped(),
            DEFAULT_CONNECTOR_TIMEOUT
        );
    }

    #[test]
    fn map_config_loads_typed_values() {
        let conf: ConfFactory = Arc::new(MapConfig::new().with("Probe", json!({"port": 8080})));
        let probe: Probe = conf.load("probe").unwrap();
        assert_eq!(probe.port, 8080);
    }

    #[test]
    fn invalid_value_is_reported_with_its_name() {
        let conf: ConfFactory = Arc::new(MapConfig::new().with("probe", json!({"port": "x"})));
        let err = conf.load::<Probe>("probe").unwrap_err();
        assert_eq!(err.as_label(), "config_invalid");
        assert!(err.to_string().contains("probe"));
    }

    #[test]
    fn missing_value_falls_back_to_default() {
        let conf: ConfFactory = Arc::new(NoConfig);
        assert!(matches!(
            conf.load::<Probe>("probe"),
            Err(ConfigError::NotFound { .. })
        ));
        assert_eq!(conf.load_or_default::<Probe>("probe").unwrap(), Probe::default());
    }
}
