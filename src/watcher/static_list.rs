//! Static list discovery watcher
//!
//! The simplest leaf: the backend set comes straight from configuration and
//! never changes at runtime. It reports its list through the notification
//! callback once on `start`, which lets a composite parent fold static
//! backends into resolution alongside dynamic sources.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::watcher::traits::{BackendRecord, NotificationCallback, Watcher, WatcherEvent};

#[derive(Debug, Clone, Deserialize)]
struct StaticOptions {
    #[serde(default)]
    backends: Vec<BackendRecord>,
}

/// Discovery watcher serving a fixed, configured backend list
#[derive(Debug)]
pub struct StaticWatcher {
    name: String,
    backends: Vec<BackendRecord>,
    callback: NotificationCallback,
    started: AtomicBool,
}

impl StaticWatcher {
    /// Build from a scoped service config whose discovery method is `static`
    pub fn new(
        name: &str,
        config: &ServiceConfig,
        callback: NotificationCallback,
    ) -> DiscoveryResult<Self> {
        let options: StaticOptions =
            serde_json::from_value(serde_json::Value::Object(config.discovery.options.clone()))
                .map_err(|e| {
                    DiscoveryError::config(format!(
                        "invalid static watcher options for '{}': {}",
                        name, e
                    ))
                })?;

        Ok(Self {
            name: name.to_string(),
            backends: options.backends,
            callback,
            started: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Watcher for StaticWatcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> DiscoveryResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!(watcher = %self.name, "static watcher already started");
            return Ok(());
        }

        info!(
            watcher = %self.name,
            backends = self.backends.len(),
            "static watcher started"
        );
        self.callback
            .call(WatcherEvent::backends(&self.name, self.backends.clone()));
        Ok(())
    }

    async fn stop(&self) -> DiscoveryResult<()> {
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn backends(&self) -> Vec<BackendRecord> {
        self.backends.clone()
    }
}
