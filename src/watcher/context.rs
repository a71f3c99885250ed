//! Runtime context threaded through watcher construction
//!
//! The context carries the cross-cutting collaborators children need:
//! the registry of constructible watcher variants and the external toggle
//! state consulted by toggle-based resolvers. It is passed down explicitly
//! at construction and forwarded to every child unmodified; watchers never
//! reach for ambient global state.

use std::fmt;
use std::sync::Arc;

use crate::watcher::registry::WatcherRegistry;

/// External source of toggle state for toggle-based resolution.
///
/// `current` is consulted on every resolution and returns the name of the
/// child that should currently serve, or `None` when no toggle state is
/// available (the resolver then falls back to its configured default).
pub trait ToggleProvider: Send + Sync {
    fn current(&self) -> Option<String>;
}

/// Runtime context for one discovery agent
pub struct AgentContext {
    registry: WatcherRegistry,
    toggle: Option<Arc<dyn ToggleProvider>>,
}

impl AgentContext {
    /// Context with the builtin watcher variants and no toggle state
    pub fn new() -> Self {
        Self::with_registry(WatcherRegistry::builtin())
    }

    /// Context with a custom watcher registry
    pub fn with_registry(registry: WatcherRegistry) -> Self {
        Self {
            registry,
            toggle: None,
        }
    }

    /// Attach an external toggle state source
    pub fn with_toggle_provider(mut self, toggle: Arc<dyn ToggleProvider>) -> Self {
        self.toggle = Some(toggle);
        self
    }

    /// Registered watcher variants
    pub fn registry(&self) -> &WatcherRegistry {
        &self.registry
    }

    /// Toggle state source, if any
    pub fn toggle_provider(&self) -> Option<&Arc<dyn ToggleProvider>> {
        self.toggle.as_ref()
    }
}

impl Default for AgentContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("registry", &self.registry)
            .field("has_toggle", &self.toggle.is_some())
            .finish()
    }
}
