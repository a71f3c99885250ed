//! Discovery configuration structures and validation
//!
//! A [`DiscoveryConfig`] is a tagged tree: the `method` field selects the
//! watcher variant, leaf-specific options stay as raw values interpreted by
//! the variant itself, and the `multi` method nests further discovery
//! configs under `watchers`. Child definitions are kept as raw JSON values
//! until validation so that malformed shapes (a child that is not a mapping,
//! a missing method) surface as configuration errors rather than parse
//! failures deep inside serde.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::watcher::registry::WatcherRegistry;

/// Method name of the composite watcher
pub const MULTI_METHOD: &str = "multi";

/// Discovery mechanism configuration for one watcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Watcher variant discriminator ("static", "dns", "multi", ...)
    #[serde(default)]
    pub method: String,
    /// Child watcher definitions, `multi` only. Kept raw until validated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchers: Option<Value>,
    /// Merge strategy, `multi` only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver: Option<ResolverConfig>,
    /// Variant-specific options (nameservers, static backend lists, ...)
    #[serde(flatten)]
    pub options: serde_json::Map<String, Value>,
}

/// Resolution strategy configuration for a composite watcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Strategy discriminator ("fallback", "s3_toggle", ...)
    #[serde(default)]
    pub method: String,
    /// Child selected when no toggle state is available (`s3_toggle` only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Strategy-specific options
    #[serde(flatten)]
    pub options: serde_json::Map<String, Value>,
}

impl DiscoveryConfig {
    /// Validate this config as a `multi` discovery tree against the set of
    /// registered watcher and resolver methods.
    ///
    /// Nested `multi` children recurse through the same validation, so a
    /// fully validated tree can be constructed without further configuration
    /// errors.
    pub fn validate_multi(&self, registry: &WatcherRegistry) -> DiscoveryResult<()> {
        if self.method != MULTI_METHOD {
            return Err(DiscoveryError::config(format!(
                "discovery method must be '{}', got '{}'",
                MULTI_METHOD, self.method
            )));
        }

        let watchers = match &self.watchers {
            None => {
                return Err(DiscoveryError::config(
                    "multi discovery requires a 'watchers' map",
                ))
            }
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(DiscoveryError::config(
                    "'watchers' must be a mapping of name to discovery config",
                ))
            }
        };

        if watchers.is_empty() {
            return Err(DiscoveryError::config("'watchers' must not be empty"));
        }

        for (name, child) in watchers {
            let child_map = match child {
                Value::Object(map) => map,
                _ => {
                    return Err(DiscoveryError::config(format!(
                        "child watcher '{}' must be a mapping",
                        name
                    )))
                }
            };

            let method = match child_map.get("method") {
                Some(Value::String(m)) if !m.is_empty() => m.as_str(),
                _ => {
                    return Err(DiscoveryError::config(format!(
                        "child watcher '{}' is missing a discovery method",
                        name
                    )))
                }
            };

            if !registry.contains(method) {
                return Err(DiscoveryError::config(format!(
                    "child watcher '{}' uses unknown method '{}'",
                    name, method
                )));
            }

            if method == MULTI_METHOD {
                let nested: DiscoveryConfig = serde_json::from_value(child.clone())?;
                nested.validate_multi(registry)?;
            }
        }

        match &self.resolver {
            None => {
                return Err(DiscoveryError::config(
                    "multi discovery requires a 'resolver' section",
                ))
            }
            Some(resolver) => {
                if resolver.method.is_empty() {
                    return Err(DiscoveryError::config(
                        "resolver config must declare a method",
                    ));
                }
                if !crate::watcher::multi::resolver::is_registered(&resolver.method) {
                    return Err(DiscoveryError::config(format!(
                        "unknown resolver method '{}'",
                        resolver.method
                    )));
                }
            }
        }

        Ok(())
    }

    /// Child watcher definitions in declaration order, parsed into typed
    /// discovery configs. Call only after [`validate_multi`] has passed.
    ///
    /// [`validate_multi`]: DiscoveryConfig::validate_multi
    pub fn child_entries(&self) -> DiscoveryResult<Vec<(String, DiscoveryConfig)>> {
        let watchers = match &self.watchers {
            Some(Value::Object(map)) => map,
            _ => {
                return Err(DiscoveryError::config(
                    "multi discovery requires a 'watchers' map",
                ))
            }
        };

        let mut entries = Vec::with_capacity(watchers.len());
        for (name, child) in watchers {
            let child_config: DiscoveryConfig = serde_json::from_value(child.clone())?;
            entries.push((name.clone(), child_config));
        }
        Ok(entries)
    }

    /// Names of the declared children, in declaration order
    pub fn child_names(&self) -> Vec<String> {
        match &self.watchers {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}
