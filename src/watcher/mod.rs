//! Discovery watchers
//!
//! This module provides the common watcher contract and its implementations:
//! - `static`: fixed backend list from configuration
//! - `dns`: periodic DNS resolution of a backend hostname
//! - `multi`: composite watcher reconciling several child watchers through a
//!   pluggable resolution strategy

pub mod context;
pub mod dns;
pub mod multi;
pub mod registry;
pub mod static_list;
pub mod traits;

pub use context::{AgentContext, ToggleProvider};
pub use dns::DnsWatcher;
pub use multi::{ChangeAggregator, MultiWatcher, Resolver};
pub use registry::{WatcherFactory, WatcherRegistry};
pub use static_list::StaticWatcher;
pub use traits::{BackendRecord, NotificationCallback, Watcher, WatcherEvent};
