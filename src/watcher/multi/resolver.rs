//! Pluggable resolution strategies for the composite watcher
//!
//! A resolver merges the per-child backend snapshot into the one
//! authoritative list. Resolution is pure with respect to the snapshot: no
//! mutation, no I/O, deterministic output order. Strategy selection is
//! dispatched by the `method` field of the resolver config; an unregistered
//! method fails construction, never resolution.

use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::config::ResolverConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::watcher::context::{AgentContext, ToggleProvider};
use crate::watcher::multi::aggregator::BackendSnapshot;
use crate::watcher::traits::BackendRecord;

/// Registered resolver method names
const METHODS: &[&str] = &["fallback", "s3_toggle"];

/// Whether a resolver method name has a registered strategy
pub fn is_registered(method: &str) -> bool {
    METHODS.contains(&method)
}

/// Merge strategy over the per-child backend snapshot
pub trait Resolver: Send + Sync {
    /// Authoritative backend list for the current snapshot
    fn resolve(&self, snapshot: &BackendSnapshot) -> Vec<BackendRecord>;
}

impl fmt::Debug for dyn Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

/// Construct the resolver declared by `config` for the given children.
///
/// `declared` lists the child names in declaration order; strategy options
/// referencing an undeclared child fail here, at construction time.
pub fn build(
    config: &ResolverConfig,
    declared: &[String],
    context: &AgentContext,
) -> DiscoveryResult<Box<dyn Resolver>> {
    match config.method.as_str() {
        "fallback" => Ok(Box::new(FallbackResolver)),
        "s3_toggle" => {
            let default = config.default.clone().ok_or_else(|| {
                DiscoveryError::config("s3_toggle resolver requires a 'default' child name")
            })?;
            if !declared.contains(&default) {
                return Err(DiscoveryError::config(format!(
                    "s3_toggle default '{}' does not name a declared watcher",
                    default
                )));
            }
            Ok(Box::new(S3ToggleResolver {
                default,
                toggle: context.toggle_provider().cloned(),
            }))
        }
        other => Err(DiscoveryError::config(format!(
            "unknown resolver method '{}'",
            other
        ))),
    }
}

/// Ordered fallback: the first child, in declared order, with a non-empty
/// backend set wins. Ties never consider names, only declaration order.
pub struct FallbackResolver;

impl Resolver for FallbackResolver {
    fn resolve(&self, snapshot: &BackendSnapshot) -> Vec<BackendRecord> {
        for (_, backends) in snapshot.iter() {
            if !backends.is_empty() {
                return backends.to_vec();
            }
        }
        Vec::new()
    }
}

/// Toggle-based selection: an externally supplied toggle state names the
/// serving child; without toggle state (or with a toggle naming an
/// undeclared child) the configured default serves.
pub struct S3ToggleResolver {
    default: String,
    toggle: Option<Arc<dyn ToggleProvider>>,
}

impl Resolver for S3ToggleResolver {
    fn resolve(&self, snapshot: &BackendSnapshot) -> Vec<BackendRecord> {
        let selected = self.toggle.as_ref().and_then(|t| t.current());

        let pick = match selected {
            Some(name) if snapshot.contains(&name) => name,
            Some(name) => {
                warn!(
                    toggle = %name,
                    default = %self.default,
                    "toggle state names an undeclared watcher, using default"
                );
                self.default.clone()
            }
            None => self.default.clone(),
        };

        snapshot.get(&pick).map(<[_]>::to_vec).unwrap_or_default()
    }
}
