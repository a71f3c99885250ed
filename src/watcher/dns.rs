//! DNS discovery watcher
//!
//! Polls A/AAAA records for a configured hostname on an interval and reports
//! the resolved address set through the notification callback whenever it
//! changes. Record ordering is sorted so that repeated resolutions of the
//! same address set compare equal downstream.

use async_trait::async_trait;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use trust_dns_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use trust_dns_resolver::{AsyncResolver, TokioAsyncResolver};

use crate::config::ServiceConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::watcher::traits::{BackendRecord, NotificationCallback, Watcher, WatcherEvent};

fn default_port() -> u16 {
    80
}

fn default_check_interval() -> u64 {
    30
}

fn default_timeout() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
struct DnsOptions {
    /// Hostname whose records describe the backend pool
    hostname: String,
    /// Port assigned to every resolved backend
    #[serde(default = "default_port")]
    port: u16,
    /// Poll interval in seconds
    #[serde(default = "default_check_interval")]
    check_interval: u64,
    /// Resolution timeout in seconds
    #[serde(default = "default_timeout")]
    timeout: u64,
    /// Nameservers to query; system-independent Google defaults when unset
    #[serde(default)]
    nameservers: Option<Vec<SocketAddr>>,
}

struct DnsInner {
    name: String,
    options: DnsOptions,
    resolver: TokioAsyncResolver,
    callback: NotificationCallback,
    healthy: AtomicBool,
    backends: Mutex<Vec<BackendRecord>>,
}

impl DnsInner {
    /// One resolution pass: look up, diff against the last reported set,
    /// notify on change. Lookup failures mark the watcher unhealthy but
    /// keep the last known backend set.
    async fn poll_once(&self) {
        let lookup = self.resolver.lookup_ip(self.options.hostname.as_str()).await;

        let ips: Vec<IpAddr> = match lookup {
            Ok(response) => response.iter().collect(),
            Err(e) => {
                warn!(watcher = %self.name, hostname = %self.options.hostname,
                      "DNS lookup failed: {}", e);
                self.healthy.store(false, Ordering::SeqCst);
                return;
            }
        };

        self.healthy.store(true, Ordering::SeqCst);
        let records = records_from_ips(&ips, self.options.port);

        let changed = {
            let mut current = lock_unpoisoned(&self.backends);
            if *current == records {
                false
            } else {
                *current = records.clone();
                true
            }
        };

        if changed {
            debug!(watcher = %self.name, backends = records.len(), "DNS backend set changed");
            self.callback
                .call(WatcherEvent::backends(&self.name, records));
        }
    }
}

/// Discovery watcher backed by periodic DNS resolution
pub struct DnsWatcher {
    inner: Arc<DnsInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for DnsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsWatcher")
            .field("name", &self.inner.name)
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

impl DnsWatcher {
    /// Build from a scoped service config whose discovery method is `dns`
    pub fn new(
        name: &str,
        config: &ServiceConfig,
        callback: NotificationCallback,
    ) -> DiscoveryResult<Self> {
        let options: DnsOptions =
            serde_json::from_value(serde_json::Value::Object(config.discovery.options.clone()))
                .map_err(|e| {
                    DiscoveryError::config(format!(
                        "invalid dns watcher options for '{}': {}",
                        name, e
                    ))
                })?;

        if options.check_interval == 0 {
            return Err(DiscoveryError::config(format!(
                "dns watcher '{}' check_interval must be greater than 0",
                name
            )));
        }

        let nameservers = options.nameservers.clone().unwrap_or_else(|| {
            vec!["8.8.8.8:53".parse().unwrap(), "8.8.4.4:53".parse().unwrap()]
        });

        let resolver_config = ResolverConfig::from_parts(
            None,
            vec![],
            nameservers
                .into_iter()
                .map(|addr| NameServerConfig::new(addr, Protocol::Udp))
                .collect::<Vec<_>>(),
        );

        let mut resolver_opts = ResolverOpts::default();
        resolver_opts.timeout = Duration::from_secs(options.timeout);

        let resolver = AsyncResolver::tokio(resolver_config, resolver_opts);

        Ok(Self {
            inner: Arc::new(DnsInner {
                name: name.to_string(),
                options,
                resolver,
                callback,
                healthy: AtomicBool::new(false),
                backends: Mutex::new(Vec::new()),
            }),
            task: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Watcher for DnsWatcher {
    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn start(&self) -> DiscoveryResult<()> {
        let mut task = lock_unpoisoned(&self.task);
        if task.is_some() {
            debug!(watcher = %self.inner.name, "dns watcher already started");
            return Ok(());
        }

        let inner = self.inner.clone();
        let interval = Duration::from_secs(inner.options.check_interval);
        info!(
            watcher = %inner.name,
            hostname = %inner.options.hostname,
            interval_secs = inner.options.check_interval,
            "dns watcher started"
        );

        *task = Some(tokio::spawn(async move {
            loop {
                inner.poll_once().await;
                tokio::time::sleep(interval).await;
            }
        }));
        Ok(())
    }

    async fn stop(&self) -> DiscoveryResult<()> {
        if let Some(handle) = lock_unpoisoned(&self.task).take() {
            handle.abort();
        }
        self.inner.healthy.store(false, Ordering::SeqCst);
        info!(watcher = %self.inner.name, "dns watcher stopped");
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.inner.healthy.load(Ordering::SeqCst)
    }

    fn backends(&self) -> Vec<BackendRecord> {
        lock_unpoisoned(&self.inner.backends).clone()
    }
}

/// Deterministically ordered backend records for a resolved address set
fn records_from_ips(ips: &[IpAddr], port: u16) -> Vec<BackendRecord> {
    let mut sorted = ips.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
        .into_iter()
        .map(|ip| BackendRecord::new(ip.to_string(), port, ip.to_string()))
        .collect()
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
