//! Test doubles for the binder's collaborators
//!
//! - [`CountingLookup`] - identity lookup that counts how often it is consulted
//! - [`RecordingWatchSource`] - watch source that records started informers
//! - [`RecordingHandler`] - event handler that records every notification

use crate::declaration::ResourceKind;
use crate::factory::WatchSource;
use crate::handler::ResourceEventHandler;
use crate::identity::{DiscoveredIdentity, IdentityLookup, IdentityTable};
use crate::informer::{InformerKey, SharedInformer, lock};
use kube::ResourceExt;
use kube::api::DynamicObject;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Identity lookup backed by an [`IdentityTable`] that counts its calls.
#[derive(Debug, Default)]
pub struct CountingLookup {
    table: IdentityTable,
    calls: AtomicUsize,
}

impl CountingLookup {
    /// Wrap a table
    pub fn new(table: IdentityTable) -> Self {
        Self {
            table,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of lookups performed
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IdentityLookup for CountingLookup {
    async fn find(&self, kind: &ResourceKind) -> Option<DiscoveredIdentity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.table.find(kind).await
    }
}

/// Watch source that only records which informers were started.
#[derive(Debug, Clone, Default)]
pub struct RecordingWatchSource {
    started: Arc<Mutex<Vec<InformerKey>>>,
}

impl RecordingWatchSource {
    /// Number of informers started
    pub fn starts(&self) -> usize {
        lock(&self.started).len()
    }

    /// Keys of the started informers, in start order
    pub fn started_keys(&self) -> Vec<InformerKey> {
        lock(&self.started).clone()
    }
}

impl WatchSource for RecordingWatchSource {
    fn start(&self, informer: Arc<SharedInformer>) {
        lock(&self.started).push(informer.key().clone());
    }
}

/// Handler recording notifications as `"<event> <namespace>/<name>"`.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<String>>,
}

impl RecordingHandler {
    /// Recorded notifications, in order
    pub fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }

    fn record(&self, event: &str, obj: &DynamicObject) {
        let namespace = obj.namespace().unwrap_or_default();
        lock(&self.events).push(format!("{event} {namespace}/{}", obj.name_any()));
    }
}

impl ResourceEventHandler for RecordingHandler {
    fn on_add(&self, obj: &DynamicObject) {
        self.record("add", obj);
    }

    fn on_update(&self, _old: &DynamicObject, new: &DynamicObject) {
        self.record("update", new);
    }

    fn on_delete(&self, obj: &DynamicObject) {
        self.record("delete", obj);
    }
}
