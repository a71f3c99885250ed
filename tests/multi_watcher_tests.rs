//! Composite watcher integration tests
//!
//! These tests drive the public API end to end with mock leaf watchers
//! registered into the watcher registry, covering construction validation,
//! scoped child configuration, lifecycle fan-out and change coalescing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use multiwatch::config::ServiceConfig;
use multiwatch::watcher::{
    AgentContext, BackendRecord, MultiWatcher, NotificationCallback, Watcher, WatcherEvent,
    WatcherRegistry,
};
use multiwatch::{DiscoveryError, DiscoveryResult};

/// Leaf watcher double recording lifecycle calls and exposing its wiring
struct MockWatcher {
    name: String,
    config: ServiceConfig,
    callback: NotificationCallback,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    healthy: AtomicBool,
    fail_start: bool,
    fail_stop: bool,
}

impl MockWatcher {
    fn new(name: &str, config: ServiceConfig, callback: NotificationCallback) -> Self {
        let fail_start = config.discovery.options.get("fail_start") == Some(&json!(true));
        let fail_stop = config.discovery.options.get("fail_stop") == Some(&json!(true));
        Self {
            name: name.to_string(),
            config,
            callback,
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            healthy: AtomicBool::new(true),
            fail_start,
            fail_stop,
        }
    }

    fn push_backends(&self, backends: Vec<BackendRecord>) {
        self.callback
            .call(WatcherEvent::backends(&self.name, backends));
    }

    fn ping(&self) {
        self.callback.call(WatcherEvent::ping(&self.name));
    }

    fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl Watcher for MockWatcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> DiscoveryResult<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(DiscoveryError::backend("mock start failure"));
        }
        Ok(())
    }

    async fn stop(&self) -> DiscoveryResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(DiscoveryError::backend("mock stop failure"));
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn backends(&self) -> Vec<BackendRecord> {
        Vec::new()
    }
}

/// Registry whose `zookeeper` and `dns` methods build mocks, plus a handle
/// to every mock it constructed, in construction order
fn mock_context() -> (Arc<AgentContext>, Arc<Mutex<Vec<Arc<MockWatcher>>>>) {
    let created: Arc<Mutex<Vec<Arc<MockWatcher>>>> = Arc::new(Mutex::new(Vec::new()));

    let mut registry = WatcherRegistry::builtin();
    for method in ["zookeeper", "dns"] {
        let sink = created.clone();
        registry.register(method, move |name, config, callback, _context| {
            let mock = Arc::new(MockWatcher::new(name, config, callback));
            sink.lock().unwrap().push(mock.clone());
            Ok(mock as Arc<dyn Watcher>)
        });
    }

    (Arc::new(AgentContext::with_registry(registry)), created)
}

fn zk_discovery() -> serde_json::Value {
    json!({"method": "zookeeper", "hosts": "localhost:2181", "path": "/smartstack"})
}

fn dns_discovery() -> serde_json::Value {
    json!({"method": "dns", "servers": ["localhost"]})
}

fn service_config(discovery: serde_json::Value) -> ServiceConfig {
    serde_json::from_value(json!({
        "name": "test",
        "haproxy": {},
        "discovery": discovery,
    }))
    .unwrap()
}

fn valid_config() -> ServiceConfig {
    service_config(json!({
        "method": "multi",
        "watchers": {
            "primary": zk_discovery(),
            "secondary": dns_discovery(),
        },
        "resolver": {"method": "fallback"},
    }))
}

fn counting_callback() -> (NotificationCallback, Arc<AtomicUsize>, Arc<Mutex<Vec<WatcherEvent>>>) {
    let count = Arc::new(AtomicUsize::new(0));
    let events: Arc<Mutex<Vec<WatcherEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let counter = count.clone();
    let sink = events.clone();
    let callback = NotificationCallback::new(move |event| {
        counter.fetch_add(1, Ordering::SeqCst);
        sink.lock().unwrap().push(event);
    });
    (callback, count, events)
}

fn record(name: &str) -> BackendRecord {
    BackendRecord::new("10.0.0.1", 1234, name)
}

mod construction {
    use super::*;

    fn build(discovery: serde_json::Value) -> DiscoveryResult<MultiWatcher> {
        let (context, _) = mock_context();
        MultiWatcher::new(
            "test",
            service_config(discovery),
            NotificationCallback::noop(),
            context,
        )
    }

    #[tokio::test]
    async fn rejects_empty_discovery() {
        assert!(build(json!({})).unwrap_err().is_config());
    }

    #[tokio::test]
    async fn rejects_empty_watcher_map() {
        assert!(build(json!({"method": "multi", "watchers": {}}))
            .unwrap_err()
            .is_config());
    }

    #[tokio::test]
    async fn rejects_misspelled_method() {
        assert!(build(json!({"method": "muli"})).unwrap_err().is_config());
    }

    #[tokio::test]
    async fn rejects_leaf_method_with_watchers() {
        assert!(build(json!({"method": "zookeeper", "watchers": {}}))
            .unwrap_err()
            .is_config());
    }

    #[tokio::test]
    async fn rejects_unknown_child_method() {
        let err = build(json!({
            "method": "multi",
            "watchers": {"secondary": {"method": "bogus"}},
            "resolver": {"method": "fallback"},
        }))
        .unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[tokio::test]
    async fn rejects_non_mapping_child() {
        assert!(build(json!({
            "method": "multi",
            "watchers": {"child": "not_a_hash"},
            "resolver": {"method": "fallback"},
        }))
        .unwrap_err()
        .is_config());
    }

    #[tokio::test]
    async fn rejects_missing_resolver() {
        assert!(build(json!({
            "method": "multi",
            "watchers": {"child": zk_discovery()},
        }))
        .unwrap_err()
        .is_config());
    }

    #[tokio::test]
    async fn rejects_empty_resolver() {
        assert!(build(json!({
            "method": "multi",
            "watchers": {"child": zk_discovery()},
            "resolver": {},
        }))
        .unwrap_err()
        .is_config());
    }

    #[tokio::test]
    async fn rejects_toggle_default_naming_undeclared_child() {
        assert!(build(json!({
            "method": "multi",
            "watchers": {"primary": zk_discovery()},
            "resolver": {"method": "s3_toggle", "default": "secondary"},
        }))
        .unwrap_err()
        .is_config());
    }

    #[tokio::test]
    async fn builds_declared_children_with_scoped_configs() {
        let (context, created) = mock_context();
        let watcher = MultiWatcher::new(
            "test",
            valid_config(),
            NotificationCallback::noop(),
            context,
        )
        .unwrap();

        assert_eq!(watcher.child_names(), vec!["primary", "secondary"]);

        let created = created.lock().unwrap();
        assert_eq!(created.len(), 2);

        let primary = &created[0];
        assert_eq!(primary.name, "primary");
        assert_eq!(primary.config.name, "test");
        assert_eq!(
            serde_json::to_value(&primary.config.discovery).unwrap(),
            zk_discovery()
        );
        assert!(primary.config.extra.contains_key("haproxy"));

        let secondary = &created[1];
        assert_eq!(secondary.name, "secondary");
        assert_eq!(
            serde_json::to_value(&secondary.config.discovery).unwrap(),
            dns_discovery()
        );
    }

    #[tokio::test]
    async fn construction_does_not_start_children() {
        let (context, created) = mock_context();
        let _watcher = MultiWatcher::new(
            "test",
            valid_config(),
            NotificationCallback::noop(),
            context,
        )
        .unwrap();

        for mock in created.lock().unwrap().iter() {
            assert_eq!(mock.start_calls.load(Ordering::SeqCst), 0);
        }
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn start_starts_every_child_once() {
        let (context, created) = mock_context();
        let watcher = MultiWatcher::new(
            "test",
            valid_config(),
            NotificationCallback::noop(),
            context,
        )
        .unwrap();

        watcher.start().await.unwrap();

        for mock in created.lock().unwrap().iter() {
            assert_eq!(mock.start_calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn start_failure_names_child_and_rolls_back() {
        let (context, created) = mock_context();
        let config = service_config(json!({
            "method": "multi",
            "watchers": {
                "primary": zk_discovery(),
                "secondary": {"method": "dns", "fail_start": true},
            },
            "resolver": {"method": "fallback"},
        }));
        let watcher =
            MultiWatcher::new("test", config, NotificationCallback::noop(), context).unwrap();

        let err = watcher.start().await.unwrap_err();
        match err {
            DiscoveryError::Start { watcher, .. } => assert_eq!(watcher, "secondary"),
            other => panic!("expected start error, got {:?}", other),
        }

        let created = created.lock().unwrap();
        // primary was started, then stopped best-effort during rollback
        assert_eq!(created[0].start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(created[0].stop_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_stops_every_child_once() {
        let (context, created) = mock_context();
        let watcher = MultiWatcher::new(
            "test",
            valid_config(),
            NotificationCallback::noop(),
            context,
        )
        .unwrap();

        watcher.start().await.unwrap();
        watcher.stop().await.unwrap();

        for mock in created.lock().unwrap().iter() {
            assert_eq!(mock.stop_calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn stop_failure_is_aggregate_and_does_not_skip_children() {
        let (context, created) = mock_context();
        let config = service_config(json!({
            "method": "multi",
            "watchers": {
                "primary": {"method": "zookeeper", "fail_stop": true},
                "secondary": dns_discovery(),
            },
            "resolver": {"method": "fallback"},
        }));
        let watcher =
            MultiWatcher::new("test", config, NotificationCallback::noop(), context).unwrap();

        let err = watcher.stop().await.unwrap_err();
        match err {
            DiscoveryError::Stop { failed } => assert_eq!(failed, vec!["primary"]),
            other => panic!("expected stop error, got {:?}", other),
        }

        let created = created.lock().unwrap();
        assert_eq!(created[1].stop_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn healthy_only_when_every_child_is() {
        let (context, created) = mock_context();
        let watcher = MultiWatcher::new(
            "test",
            valid_config(),
            NotificationCallback::noop(),
            context,
        )
        .unwrap();

        assert!(watcher.is_healthy());

        created.lock().unwrap()[1].set_healthy(false);
        assert!(!watcher.is_healthy());

        created.lock().unwrap()[1].set_healthy(true);
        assert!(watcher.is_healthy());
    }
}

mod notifications {
    use super::*;

    #[tokio::test]
    async fn child_signals_never_reach_outer_callback_directly() {
        let (context, created) = mock_context();
        let (callback, count, _) = counting_callback();
        let _watcher =
            MultiWatcher::new("test", valid_config(), callback, context).unwrap();

        // Reconfigure pings resolve to the same (empty) set: intercepted by
        // the aggregator, coalesced, nothing forwarded upward.
        let created = created.lock().unwrap();
        for mock in created.iter() {
            mock.ping();
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn backend_change_is_forwarded_exactly_once() {
        let (context, created) = mock_context();
        let (callback, count, events) = counting_callback();
        let watcher = MultiWatcher::new("test", valid_config(), callback, context).unwrap();

        let hosts = vec![record("i-test")];
        created.lock().unwrap()[0].push_backends(hosts.clone());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(watcher.backends(), hosts);

        let events = events.lock().unwrap();
        assert_eq!(events[0].watcher, "test");
        assert_eq!(events[0].backends, Some(hosts));
    }

    #[tokio::test]
    async fn duplicate_resolutions_are_coalesced() {
        let (context, created) = mock_context();
        let (callback, count, _) = counting_callback();
        let _watcher = MultiWatcher::new("test", valid_config(), callback, context).unwrap();

        let created = created.lock().unwrap();
        created[0].push_backends(vec![record("i-test")]);
        created[0].push_backends(vec![record("i-test")]);
        // secondary's view is shadowed by primary under fallback resolution
        created[1].push_backends(vec![record("i-other")]);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn each_distinct_resolution_emits() {
        let (context, created) = mock_context();
        let (callback, count, _) = counting_callback();
        let _watcher = MultiWatcher::new("test", valid_config(), callback, context).unwrap();

        let created = created.lock().unwrap();
        for i in 0..4 {
            created[0].push_backends(vec![record(&format!("i-{}", i))]);
        }
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn fallback_switches_when_primary_empties() {
        let (context, created) = mock_context();
        let (callback, count, _) = counting_callback();
        let watcher = MultiWatcher::new("test", valid_config(), callback, context).unwrap();

        let created = created.lock().unwrap();
        created[1].push_backends(vec![record("i-secondary")]);
        assert_eq!(watcher.backends(), vec![record("i-secondary")]);

        created[0].push_backends(vec![record("i-primary")]);
        assert_eq!(watcher.backends(), vec![record("i-primary")]);

        created[0].push_backends(vec![]);
        assert_eq!(watcher.backends(), vec![record("i-secondary")]);

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}

mod nesting {
    use super::*;

    #[tokio::test]
    async fn nested_multi_propagates_coalesced_changes() {
        let (context, created) = mock_context();
        let (callback, count, _) = counting_callback();
        let config = service_config(json!({
            "method": "multi",
            "watchers": {
                "inner": {
                    "method": "multi",
                    "watchers": {"leaf": zk_discovery()},
                    "resolver": {"method": "fallback"},
                },
                "flat": dns_discovery(),
            },
            "resolver": {"method": "fallback"},
        }));

        let watcher = MultiWatcher::new("test", config, callback, context).unwrap();
        assert_eq!(watcher.child_names(), vec!["inner", "flat"]);

        // The single mock is the innermost leaf; its change must climb both
        // aggregation levels exactly once.
        let created = created.lock().unwrap();
        assert_eq!(created.len(), 2);
        let leaf = created.iter().find(|m| m.name == "leaf").unwrap();

        leaf.push_backends(vec![record("i-deep")]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(watcher.backends(), vec![record("i-deep")]);

        // Identical list again is coalesced at the inner level already
        leaf.push_backends(vec![record("i-deep")]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
