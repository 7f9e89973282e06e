//! Environment-based configuration.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `INFORMER_NAMESPACE` | pod namespace, then `default` | Ambient namespace |
//! | `INFORMER_DISCOVERY_ENABLED` | `true` | Resolve identities through API discovery |
//! | `INFORMER_DISCOVERY_REFRESH_SECS` | `1800` | Discovery cache refresh interval |
//! | `INFORMER_WATCH_NAMESPACES` | empty | Comma-separated namespaces for supplier-driven handlers |
//! | `INFORMER_LABEL_SELECTOR` | empty | Label selector for supplier-driven handlers |

use crate::discovery::DEFAULT_REFRESH_INTERVAL;
use crate::error::InformerError;
use crate::namespace::AmbientNamespace;
use std::time::Duration;

/// Informer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformerConfig {
    /// Explicit ambient namespace
    pub namespace: Option<String>,
    /// Whether identities may be resolved through discovery
    pub discovery_enabled: bool,
    /// Discovery cache refresh interval
    pub discovery_refresh: Duration,
    /// Namespaces handed to namespace suppliers
    pub watch_namespaces: Vec<String>,
    /// Label selector handed to selector suppliers
    pub label_selector: Option<String>,
}

impl Default for InformerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            discovery_enabled: true,
            discovery_refresh: DEFAULT_REFRESH_INTERVAL,
            watch_namespaces: Vec::new(),
            label_selector: None,
        }
    }
}

impl InformerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// - [`InformerError::InvalidConfig`] if a variable cannot be parsed
    pub fn from_env() -> Result<Self, InformerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through a variable lookup function.
    ///
    /// # Errors
    ///
    /// - [`InformerError::InvalidConfig`] if a variable cannot be parsed
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, InformerError> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let discovery_enabled = match non_empty("INFORMER_DISCOVERY_ENABLED") {
            Some(value) => parse_bool("INFORMER_DISCOVERY_ENABLED", &value)?,
            None => defaults.discovery_enabled,
        };

        let discovery_refresh = match non_empty("INFORMER_DISCOVERY_REFRESH_SECS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| {
                    InformerError::InvalidConfig(format!(
                        "INFORMER_DISCOVERY_REFRESH_SECS must be a number of seconds, got '{value}': {e}"
                    ))
                })?,
            None => defaults.discovery_refresh,
        };

        let watch_namespaces = non_empty("INFORMER_WATCH_NAMESPACES")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|ns| !ns.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            namespace: non_empty("INFORMER_NAMESPACE").map(|ns| ns.trim().to_string()),
            discovery_enabled,
            discovery_refresh,
            watch_namespaces,
            label_selector: non_empty("INFORMER_LABEL_SELECTOR").map(|s| s.trim().to_string()),
        })
    }

    /// Ambient namespace resolver for this configuration
    pub fn ambient_namespace(&self) -> AmbientNamespace {
        AmbientNamespace::new(self.namespace.clone())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, InformerError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(InformerError::InvalidConfig(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}
