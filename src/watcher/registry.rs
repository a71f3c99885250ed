//! Watcher variant registry and child construction
//!
//! Watcher variants form a closed, registered set dispatched by the
//! `method` string in the discovery config. The builtin table covers
//! `static`, `dns` and `multi`; [`WatcherRegistry::register`] extends the
//! set (tests register mock variants this way). An unregistered method is a
//! configuration error at construction time, never a runtime surprise.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::ServiceConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::watcher::context::AgentContext;
use crate::watcher::dns::DnsWatcher;
use crate::watcher::multi::MultiWatcher;
use crate::watcher::static_list::StaticWatcher;
use crate::watcher::traits::{NotificationCallback, Watcher};

/// Constructor for one watcher variant: `(name, scoped config, shared
/// notification callback, runtime context)`
pub type WatcherFactory = Arc<
    dyn Fn(
            &str,
            ServiceConfig,
            NotificationCallback,
            Arc<AgentContext>,
        ) -> DiscoveryResult<Arc<dyn Watcher>>
        + Send
        + Sync,
>;

/// Table of constructible watcher variants, keyed by method name
#[derive(Clone)]
pub struct WatcherRegistry {
    factories: HashMap<String, WatcherFactory>,
}

impl WatcherRegistry {
    /// Empty registry with no variants
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the builtin variants: `static`, `dns`, `multi`
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("static", |name, config, callback, _context| {
            Ok(Arc::new(StaticWatcher::new(name, &config, callback)?) as Arc<dyn Watcher>)
        });
        registry.register("dns", |name, config, callback, _context| {
            Ok(Arc::new(DnsWatcher::new(name, &config, callback)?) as Arc<dyn Watcher>)
        });
        registry.register("multi", |name, config, callback, context| {
            Ok(Arc::new(MultiWatcher::new(name, config, callback, context)?) as Arc<dyn Watcher>)
        });
        registry
    }

    /// Register a watcher variant under a method name, replacing any
    /// existing registration for that name
    pub fn register<F>(&mut self, method: &str, factory: F)
    where
        F: Fn(
                &str,
                ServiceConfig,
                NotificationCallback,
                Arc<AgentContext>,
            ) -> DiscoveryResult<Arc<dyn Watcher>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(method.to_string(), Arc::new(factory));
    }

    /// Whether a method name has a registered variant
    pub fn contains(&self, method: &str) -> bool {
        self.factories.contains_key(method)
    }

    /// Registered method names
    pub fn methods(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Construct one watcher for a registered method
    pub fn build(
        &self,
        method: &str,
        name: &str,
        config: ServiceConfig,
        callback: NotificationCallback,
        context: Arc<AgentContext>,
    ) -> DiscoveryResult<Arc<dyn Watcher>> {
        let factory = self.factories.get(method).ok_or_else(|| {
            DiscoveryError::config(format!("unknown watcher method '{}'", method))
        })?;
        debug!(watcher = name, method, "building watcher");
        factory(name, config, callback, context)
    }
}

impl fmt::Debug for WatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods = self.methods();
        methods.sort_unstable();
        f.debug_struct("WatcherRegistry")
            .field("methods", &methods)
            .finish()
    }
}

/// Validate a `multi` discovery config and construct all of its children.
///
/// Each child receives a scoped configuration (the parent config with the
/// `discovery` section replaced by the child's own sub-config), the shared
/// notification callback, and the parent runtime context unmodified.
/// Either every declared child is built or the whole construction fails;
/// no partially initialized set is returned.
pub fn build_children(
    config: &ServiceConfig,
    callback: &NotificationCallback,
    context: &Arc<AgentContext>,
) -> DiscoveryResult<Vec<(String, Arc<dyn Watcher>)>> {
    config.discovery.validate_multi(context.registry())?;

    let entries = config.discovery.child_entries()?;
    let mut children = Vec::with_capacity(entries.len());
    for (name, child_discovery) in entries {
        let method = child_discovery.method.clone();
        let scoped = config.scoped(child_discovery);
        let watcher = context
            .registry()
            .build(&method, &name, scoped, callback.clone(), context.clone())?;
        children.push((name, watcher));
    }
    Ok(children)
}
