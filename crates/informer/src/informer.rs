//! Shared informers.
//!
//! A [`SharedInformer`] is one watch stream keyed by [`InformerKey`]. It keeps
//! a local cache of the watched objects and fans every change out to all
//! attached [`ResourceEventHandler`]s.

use crate::declaration::ResourceKind;
use crate::handler::ResourceEventHandler;
use kube::ResourceExt;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use kube_runtime::watcher;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

/// Uniquely identifies a shared informer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InformerKey {
    /// Resource type
    pub resource: ResourceKind,
    /// List type of the resource
    pub list_kind: String,
    /// Resolved API group
    pub group: String,
    /// Resolved plural resource name
    pub plural: String,
    /// Watched namespace; `None` for all namespaces
    pub namespace: Option<String>,
    /// Label selector; `None` for no filtering
    pub label_selector: Option<String>,
    /// Resync period; zero disables resync
    pub resync: Duration,
}

impl InformerKey {
    /// API resource to list and watch
    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(&self.group, self.resource.version(), &self.resource.kind);
        ApiResource::from_gvk_with_plural(&gvk, &self.plural)
    }
}

impl fmt::Display for InformerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = if self.group.is_empty() { "core" } else { &self.group };
        write!(
            f,
            "{}.{} in {} (selector: {}, resync: {:?})",
            self.plural,
            group,
            self.namespace.as_deref().unwrap_or("all namespaces"),
            self.label_selector.as_deref().unwrap_or("<none>"),
            self.resync
        )
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn object_key(obj: &DynamicObject) -> String {
    match obj.namespace() {
        Some(namespace) => format!("{}/{}", namespace, obj.name_any()),
        None => obj.name_any(),
    }
}

/// One shared watch stream and its listeners.
///
/// Event dispatch, resync and the replay to a newly attached handler are
/// serialized, so every handler sees each object's changes in order. Handlers
/// must not call back into the informer that notifies them.
pub struct SharedInformer {
    key: InformerKey,
    // Held while the cache changes and handlers are notified
    dispatch: Mutex<()>,
    listeners: RwLock<Vec<Arc<dyn ResourceEventHandler>>>,
    cache: RwLock<BTreeMap<String, DynamicObject>>,
    // Keys seen since the last `Init`, while a relist is in progress
    relist: Mutex<Option<BTreeSet<String>>>,
    synced: AtomicBool,
    started: AtomicBool,
    task: Mutex<Option<AbortHandle>>,
}

impl SharedInformer {
    /// Create an informer that is not yet started
    pub fn new(key: InformerKey) -> Self {
        Self {
            key,
            dispatch: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            cache: RwLock::new(BTreeMap::new()),
            relist: Mutex::new(None),
            synced: AtomicBool::new(false),
            started: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// The key this informer is registered under
    pub fn key(&self) -> &InformerKey {
        &self.key
    }

    /// Attach a handler.
    ///
    /// Objects already in the cache are replayed to the new handler as adds.
    pub fn add_event_handler(&self, handler: Arc<dyn ResourceEventHandler>) {
        let _dispatch = lock(&self.dispatch);
        write(&self.listeners).push(Arc::clone(&handler));
        let existing = self.cached();

        debug!(
            "Attached handler to informer {} ({} cached objects)",
            self.key,
            existing.len()
        );
        for obj in &existing {
            handler.on_add(obj);
        }
    }

    /// Number of attached handlers
    pub fn handler_count(&self) -> usize {
        read(&self.listeners).len()
    }

    /// Snapshot of the cached objects
    pub fn cached(&self) -> Vec<DynamicObject> {
        read(&self.cache).values().cloned().collect()
    }

    /// Whether the initial list has completed
    pub fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Whether the watch has been started
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Mark the informer started; returns `false` if it already was
    pub(crate) fn mark_started(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Remember the task driving this informer so it can be stopped
    pub fn set_task(&self, handle: AbortHandle) {
        if let Some(previous) = lock(&self.task).replace(handle) {
            previous.abort();
        }
    }

    /// Stop the task driving this informer
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.task).take() {
            debug!("Stopping informer {}", self.key);
            handle.abort();
        }
        self.started.store(false, Ordering::Release);
    }

    /// Apply a watch event to the cache and notify handlers
    pub fn handle_event(&self, event: watcher::Event<DynamicObject>) {
        let _dispatch = lock(&self.dispatch);
        match event {
            watcher::Event::Init => {
                trace!("Informer {} relisting", self.key);
                *lock(&self.relist) = Some(BTreeSet::new());
            }
            watcher::Event::InitApply(obj) => {
                if let Some(seen) = lock(&self.relist).as_mut() {
                    seen.insert(object_key(&obj));
                }
                self.apply(obj);
            }
            watcher::Event::InitDone => {
                let seen = lock(&self.relist).take();
                if let Some(seen) = seen {
                    let stale: Vec<DynamicObject> = {
                        let mut cache = write(&self.cache);
                        let stale_keys: Vec<String> = cache
                            .keys()
                            .filter(|key| !seen.contains(*key))
                            .cloned()
                            .collect();
                        stale_keys.iter().filter_map(|key| cache.remove(key)).collect()
                    };
                    for obj in &stale {
                        self.notify_delete(obj);
                    }
                }
                self.synced.store(true, Ordering::Release);
                debug!("Informer {} synced", self.key);
            }
            watcher::Event::Apply(obj) => self.apply(obj),
            watcher::Event::Delete(obj) => {
                write(&self.cache).remove(&object_key(&obj));
                self.notify_delete(&obj);
            }
        }
    }

    /// Redeliver every cached object to every handler as an update
    pub fn resync(&self) {
        let _dispatch = lock(&self.dispatch);
        let objects = self.cached();
        let listeners = self.listeners();
        trace!("Resyncing {} objects of informer {}", objects.len(), self.key);
        for obj in &objects {
            for listener in &listeners {
                listener.on_update(obj, obj);
            }
        }
    }

    fn listeners(&self) -> Vec<Arc<dyn ResourceEventHandler>> {
        read(&self.listeners).clone()
    }

    fn apply(&self, obj: DynamicObject) {
        let old = write(&self.cache).insert(object_key(&obj), obj.clone());
        let listeners = self.listeners();
        match old {
            Some(old) => listeners.iter().for_each(|l| l.on_update(&old, &obj)),
            None => listeners.iter().for_each(|l| l.on_add(&obj)),
        }
    }

    fn notify_delete(&self, obj: &DynamicObject) {
        for listener in self.listeners() {
            listener.on_delete(obj);
        }
    }
}

impl fmt::Debug for SharedInformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedInformer")
            .field("key", &self.key)
            .field("handlers", &self.handler_count())
            .field("cached", &read(&self.cache).len())
            .field("synced", &self.has_synced())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}
