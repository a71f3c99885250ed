//! # multiwatch - composite service-discovery watcher
//!
//! multiwatch is the discovery-aggregation core of a service-discovery
//! agent feeding a load-balancer configuration generator. One logical
//! backend pool may be discoverable through several independent mechanisms
//! (registries, DNS, static lists); the composite watcher owns one child
//! watcher per mechanism, reconciles their possibly-conflicting backend
//! views through a pluggable resolution strategy, and propagates a change
//! upward only when the authoritative backend set actually changed.
//!
//! ## Core pieces
//!
//! - **Watcher contract**: `start` / `stop` / `is_healthy` / `backends`,
//!   identical for leaf and composite watchers
//! - **Resolvers**: ordered fallback and toggle-based source selection
//! - **Change aggregation**: one shared notification callback per composite,
//!   serialized recomputation, coalescing of no-op changes
//!
//! ## Usage example
//!
//! ```rust,no_run
//! use multiwatch::config::ServiceConfig;
//! use multiwatch::watcher::{AgentContext, MultiWatcher, NotificationCallback, Watcher};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::from_file_with_env("service.toml").await?;
//!     let context = Arc::new(AgentContext::new());
//!     let on_change = NotificationCallback::new(|event| {
//!         println!("authoritative backends changed: {:?}", event.backends);
//!     });
//!     let watcher = MultiWatcher::new("web", config, on_change, context)?;
//!     watcher.start().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod watcher;

// Re-export commonly used types
pub use config::{DiscoveryConfig, ResolverConfig, ServiceConfig};
pub use error::{DiscoveryError, DiscoveryResult};
pub use watcher::{
    AgentContext, BackendRecord, MultiWatcher, NotificationCallback, ToggleProvider, Watcher,
    WatcherEvent, WatcherRegistry,
};
