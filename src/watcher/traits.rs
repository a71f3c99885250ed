//! Core traits and types for discovery watchers
//!
//! Every discovery mechanism, leaf or composite, implements the same
//! [`Watcher`] contract: callers of a composite watcher cannot tell it apart
//! from a leaf. Watchers report changes by invoking the
//! [`NotificationCallback`] they were handed at construction; they never
//! reach around it to the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::DiscoveryResult;

/// One discovered backend instance. Immutable value; equality is field
/// equality, and backend lists compare order-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRecord {
    /// IP address or hostname
    pub host: String,
    /// Port number
    pub port: u16,
    /// Logical instance identifier
    pub name: String,
}

impl BackendRecord {
    /// Create a new backend record
    pub fn new<H: Into<String>, N: Into<String>>(host: H, port: u16, name: N) -> Self {
        Self {
            host: host.into(),
            port,
            name: name.into(),
        }
    }
}

impl fmt::Display for BackendRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port)
    }
}

/// Event pushed by a watcher into its parent's notification sink
#[derive(Debug, Clone)]
pub struct WatcherEvent {
    /// Name of the watcher reporting the change
    pub watcher: String,
    /// New backend list, or `None` for a reconfigure-only ping
    pub backends: Option<Vec<BackendRecord>>,
}

impl WatcherEvent {
    /// Event carrying a new backend list
    pub fn backends<W: Into<String>>(watcher: W, backends: Vec<BackendRecord>) -> Self {
        Self {
            watcher: watcher.into(),
            backends: Some(backends),
        }
    }

    /// Reconfigure-only ping with no new backend list
    pub fn ping<W: Into<String>>(watcher: W) -> Self {
        Self {
            watcher: watcher.into(),
            backends: None,
        }
    }
}

/// Shared notification capability handed to every child of one composite
/// watcher (and to a top-level watcher by the orchestrator).
///
/// Invocable from any thread, any number of times, and never fails; errors
/// inside the sink stay in the sink. Cloning shares the underlying sink.
#[derive(Clone)]
pub struct NotificationCallback {
    sink: Arc<dyn Fn(WatcherEvent) + Send + Sync>,
}

impl NotificationCallback {
    /// Wrap a sink function into a callback
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(WatcherEvent) + Send + Sync + 'static,
    {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// A callback that discards every event
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Deliver an event to the sink
    pub fn call(&self, event: WatcherEvent) {
        (self.sink)(event);
    }
}

impl fmt::Debug for NotificationCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCallback").finish_non_exhaustive()
    }
}

/// Common lifecycle and notification contract for discovery watchers
#[async_trait]
pub trait Watcher: Send + Sync {
    /// Watcher name: the service name for a top-level watcher, the map key
    /// for a child of a composite
    fn name(&self) -> &str;

    /// Start background discovery activity. Construction never starts a
    /// watcher; lifecycle is caller-driven.
    async fn start(&self) -> DiscoveryResult<()>;

    /// Stop background discovery activity
    async fn stop(&self) -> DiscoveryResult<()>;

    /// Whether this watcher's discovery source is currently live
    fn is_healthy(&self) -> bool;

    /// Last reported backend set (a composite reports its resolved set)
    fn backends(&self) -> Vec<BackendRecord>;
}

impl fmt::Debug for dyn Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
