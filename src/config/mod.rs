//! Configuration management for the discovery agent
//!
//! The root [`ServiceConfig`] mirrors the shape a discovery agent hands to
//! each of its watchers: a service `name`, a `discovery` section describing
//! how backends for that service are found, and an arbitrary set of
//! passthrough sections (load-balancer options and the like) that this core
//! copies but never interprets. Scoping a config for a child watcher is a
//! shallow copy with only the `discovery` section replaced.
//!
//! Files are TOML with environment variable expansion (`${VAR}` and
//! `${VAR:-default}`).

pub mod discovery;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::{info, warn};

pub use discovery::{DiscoveryConfig, ResolverConfig};

/// Full configuration for one watched service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Logical service name
    #[serde(default)]
    pub name: String,
    /// Discovery mechanism for this service
    pub discovery: DiscoveryConfig,
    /// Passthrough sections (e.g. generator options) copied unchanged into
    /// every scoped child configuration
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ServiceConfig {
    /// Load configuration from file with environment variable expansion
    pub async fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;

        let expanded_content = expand_env_vars(&content);
        let config: ServiceConfig = toml::from_str(&expanded_content)?;
        config.validate()?;

        info!("Configuration loaded from {:?}", path.as_ref());
        Ok(config)
    }

    /// Basic shape validation, independent of which watcher methods are
    /// registered. Full `multi` validation happens at watcher construction.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(anyhow::anyhow!("Service name must not be empty"));
        }
        if self.discovery.method.is_empty() {
            return Err(anyhow::anyhow!("Discovery method must not be empty"));
        }
        Ok(())
    }

    /// Scoped configuration for a child watcher: shallow copy of this config
    /// with the `discovery` section replaced by the child's sub-config.
    pub fn scoped(&self, child_discovery: DiscoveryConfig) -> ServiceConfig {
        ServiceConfig {
            name: self.name.clone(),
            discovery: child_discovery,
            extra: self.extra.clone(),
        }
    }
}

/// Expand `${VAR}` and `${VAR:-default}` expressions in config content
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_expr = &result[start + 2..start + end];
            let replacement = if let Some(default_pos) = var_expr.find(":-") {
                let var_name = &var_expr[..default_pos];
                let default_value = &var_expr[default_pos + 2..];
                env::var(var_name).unwrap_or_else(|_| default_value.to_string())
            } else {
                env::var(var_expr).unwrap_or_else(|_| {
                    warn!(
                        "Environment variable '{}' not found, using empty string",
                        var_expr
                    );
                    String::new()
                })
            };

            result.replace_range(start..start + end + 1, &replacement);
        } else {
            break; // Malformed ${VAR expression
        }
    }

    result
}
