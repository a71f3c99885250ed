//! Composite discovery watcher
//!
//! A [`MultiWatcher`] owns a set of heterogeneous child watchers and
//! presents them as one watcher: callers see the common [`Watcher`]
//! contract, and the backend set they observe is the children's views
//! reconciled through a pluggable resolution strategy. Child notifications
//! are intercepted by the composite's own aggregator; only a coalesced,
//! genuinely-changed resolution is forwarded through the callback the
//! composite itself received at construction.

pub mod aggregator;
pub mod resolver;

pub use aggregator::{BackendSnapshot, ChangeAggregator};
pub use resolver::{FallbackResolver, Resolver, S3ToggleResolver};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::watcher::context::AgentContext;
use crate::watcher::registry;
use crate::watcher::traits::{BackendRecord, NotificationCallback, Watcher};

/// Watcher composing N child discovery watchers behind one contract
pub struct MultiWatcher {
    name: String,
    children: Vec<(String, Arc<dyn Watcher>)>,
    aggregator: Arc<ChangeAggregator>,
}

impl fmt::Debug for MultiWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let children: Vec<&str> = self.children.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("MultiWatcher")
            .field("name", &self.name)
            .field("children", &children)
            .finish()
    }
}

impl MultiWatcher {
    /// Construct the composite from a validated `multi` discovery config.
    ///
    /// Fails with a configuration error on any invalid shape (see
    /// [`DiscoveryConfig::validate_multi`]); on success every declared child
    /// has been built and wired to one shared notification callback bound
    /// to this composite's aggregator. No child is started.
    ///
    /// `callback` is this watcher's own outward-facing notification
    /// capability; it fires only when the resolved backend set changes.
    ///
    /// [`DiscoveryConfig::validate_multi`]: crate::config::DiscoveryConfig::validate_multi
    pub fn new(
        name: &str,
        config: ServiceConfig,
        callback: NotificationCallback,
        context: Arc<AgentContext>,
    ) -> DiscoveryResult<Self> {
        config.discovery.validate_multi(context.registry())?;

        let resolver_config = config.discovery.resolver.clone().ok_or_else(|| {
            DiscoveryError::config("multi discovery requires a 'resolver' section")
        })?;
        let child_names = config.discovery.child_names();
        let resolver = resolver::build(&resolver_config, &child_names, context.as_ref())?;

        let aggregator = Arc::new(ChangeAggregator::new(
            name,
            child_names.clone(),
            resolver,
            callback,
        ));

        let agg = aggregator.clone();
        let child_callback = NotificationCallback::new(move |event| agg.on_child_event(event));

        let children = registry::build_children(&config, &child_callback, &context)?;

        info!(
            watcher = name,
            children = ?child_names,
            resolver = %resolver_config.method,
            "multi watcher constructed"
        );

        Ok(Self {
            name: name.to_string(),
            children,
            aggregator,
        })
    }

    /// Names of the owned children, in declaration order
    pub fn child_names(&self) -> Vec<&str> {
        self.children.iter().map(|(name, _)| name.as_str()).collect()
    }
}

#[async_trait]
impl Watcher for MultiWatcher {
    fn name(&self) -> &str {
        &self.name
    }

    /// Start every child. If any child fails, the children already started
    /// are stopped best-effort and the failure is surfaced naming the child;
    /// no partially started composite remains.
    async fn start(&self) -> DiscoveryResult<()> {
        let mut started: Vec<&(String, Arc<dyn Watcher>)> = Vec::new();

        for entry in &self.children {
            let (child_name, child) = entry;
            if let Err(e) = child.start().await {
                error!(
                    watcher = %self.name,
                    child = %child_name,
                    "child failed to start: {}", e
                );
                for (stopped_name, stopped) in started.iter().rev() {
                    if let Err(stop_err) = stopped.stop().await {
                        warn!(
                            watcher = %self.name,
                            child = %stopped_name,
                            "rollback stop failed: {}", stop_err
                        );
                    }
                }
                return Err(DiscoveryError::start(child_name, e.to_string()));
            }
            started.push(entry);
        }

        info!(watcher = %self.name, children = self.children.len(), "multi watcher started");
        Ok(())
    }

    /// Stop every child regardless of individual failures, then surface an
    /// aggregate error naming the children that failed to stop.
    async fn stop(&self) -> DiscoveryResult<()> {
        let mut failed = Vec::new();

        for (child_name, child) in &self.children {
            if let Err(e) = child.stop().await {
                error!(
                    watcher = %self.name,
                    child = %child_name,
                    "child failed to stop: {}", e
                );
                failed.push(child_name.clone());
            }
        }

        if failed.is_empty() {
            info!(watcher = %self.name, "multi watcher stopped");
            Ok(())
        } else {
            Err(DiscoveryError::stop(failed))
        }
    }

    /// Healthy iff every child is healthy: a resolver may depend on any
    /// child at any time, so one dead source makes the composite unreliable.
    fn is_healthy(&self) -> bool {
        self.children.iter().all(|(_, child)| child.is_healthy())
    }

    fn backends(&self) -> Vec<BackendRecord> {
        self.aggregator.resolved()
    }
}
