//! Change aggregation and coalescing for the composite watcher
//!
//! Every child of one composite reports into the same [`ChangeAggregator`]
//! through the shared notification callback. The aggregator serializes
//! concurrent child events behind one exclusive lock: snapshot update,
//! resolution, comparison and the replacement of the resolved set form a
//! single critical section, so a later event can never be overwritten by an
//! earlier one and the resolver always sees a consistent snapshot. Upward
//! notification is suppressed whenever recomputation yields the sequence
//! already emitted.

use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::watcher::multi::resolver::Resolver;
use crate::watcher::traits::{BackendRecord, NotificationCallback, WatcherEvent};

/// Last known backend set per child, in declaration order.
///
/// Owned exclusively by the aggregator; the declaration order of entries is
/// what ordered strategies (fallback) resolve against.
#[derive(Debug, Clone)]
pub struct BackendSnapshot {
    entries: Vec<(String, Vec<BackendRecord>)>,
}

impl BackendSnapshot {
    /// Snapshot with an empty backend list per declared child
    pub fn new(child_names: Vec<String>) -> Self {
        Self {
            entries: child_names
                .into_iter()
                .map(|name| (name, Vec::new()))
                .collect(),
        }
    }

    /// Replace one child's backend list. Returns false when the name does
    /// not belong to a declared child.
    pub fn update(&mut self, name: &str, backends: Vec<BackendRecord>) -> bool {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some((_, entry)) => {
                *entry = backends;
                true
            }
            None => false,
        }
    }

    /// Backend list of one child
    pub fn get(&self, name: &str) -> Option<&[BackendRecord]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.as_slice())
    }

    /// Whether a child of this name is declared
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Entries in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[BackendRecord])> {
        self.entries
            .iter()
            .map(|(name, backends)| (name.as_str(), backends.as_slice()))
    }
}

struct AggregatorState {
    snapshot: BackendSnapshot,
    resolved: Vec<BackendRecord>,
}

/// Shared notification sink for all children of one composite watcher
pub struct ChangeAggregator {
    watcher_name: String,
    resolver: Box<dyn Resolver>,
    upstream: NotificationCallback,
    state: Mutex<AggregatorState>,
}

impl ChangeAggregator {
    /// Aggregator for the named composite over the declared children.
    /// `upstream` is the composite's own outward-facing callback, invoked
    /// only when the resolved set actually changes.
    pub fn new(
        watcher_name: &str,
        child_names: Vec<String>,
        resolver: Box<dyn Resolver>,
        upstream: NotificationCallback,
    ) -> Self {
        Self {
            watcher_name: watcher_name.to_string(),
            resolver,
            upstream,
            state: Mutex::new(AggregatorState {
                snapshot: BackendSnapshot::new(child_names),
                resolved: Vec::new(),
            }),
        }
    }

    /// Handle one child event. Never fails the calling child: malformed
    /// events degrade to a no-op resolution, and lock poisoning is
    /// recovered from.
    pub fn on_child_event(&self, event: WatcherEvent) {
        let mut state = self.lock_state();

        if let Some(backends) = event.backends {
            if !state.snapshot.update(&event.watcher, backends) {
                warn!(
                    watcher = %self.watcher_name,
                    child = %event.watcher,
                    "event from undeclared child, treating as reconfigure ping"
                );
            }
        }

        let candidate = self.resolver.resolve(&state.snapshot);
        if candidate == state.resolved {
            debug!(
                watcher = %self.watcher_name,
                child = %event.watcher,
                "resolved set unchanged, coalescing"
            );
            return;
        }

        info!(
            watcher = %self.watcher_name,
            child = %event.watcher,
            backends = candidate.len(),
            "resolved backend set changed"
        );
        state.resolved = candidate.clone();

        // Still inside the critical section: the emission order upward must
        // match the order resolved sets were computed in.
        self.upstream
            .call(WatcherEvent::backends(&self.watcher_name, candidate));
    }

    /// The authoritative backend set last emitted (empty before any event)
    pub fn resolved(&self) -> Vec<BackendRecord> {
        self.lock_state().resolved.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, AggregatorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
