//! Shared informer registry.
//!
//! The factory hands out at most one [`SharedInformer`] per [`InformerKey`].
//! Concurrent requests for the same key race on the map entry; the winner
//! creates the informer and every racer receives the winner's handle.

use crate::binder::ResolvedWatchSpec;
use crate::informer::{InformerKey, SharedInformer};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of shared informers, keyed by resolved watch specification.
pub trait InformerRegistry: Send + Sync {
    /// Informers for every namespace of the spec, created on first request.
    ///
    /// When `start` is set, informers that are not yet running are started.
    fn informers_for(&self, spec: &ResolvedWatchSpec, start: bool) -> Vec<Arc<SharedInformer>>;
}

/// Starts the list/watch that feeds an informer.
pub trait WatchSource: Send + Sync {
    /// Start feeding events into the informer
    fn start(&self, informer: Arc<SharedInformer>);
}

/// Default [`InformerRegistry`] backed by a [`WatchSource`].
pub struct SharedInformerFactory<S> {
    source: S,
    informers: DashMap<InformerKey, Arc<SharedInformer>>,
}

impl<S: WatchSource> SharedInformerFactory<S> {
    /// Create an empty factory
    pub fn new(source: S) -> Self {
        Self {
            source,
            informers: DashMap::new(),
        }
    }

    /// The informer for a key, creating it if needed
    pub fn informer_for(&self, key: InformerKey, start: bool) -> Arc<SharedInformer> {
        let informer = match self.informers.entry(key) {
            Entry::Occupied(entry) => {
                debug!("Reusing shared informer {}", entry.key());
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => {
                info!("Creating shared informer {}", entry.key());
                let informer = Arc::new(SharedInformer::new(entry.key().clone()));
                entry.insert(Arc::clone(&informer));
                informer
            }
        };

        if start && informer.mark_started() {
            self.source.start(Arc::clone(&informer));
        }
        informer
    }

    /// The informer registered under a key, if any
    pub fn existing_informer(&self, key: &InformerKey) -> Option<Arc<SharedInformer>> {
        self.informers.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Every registered informer
    pub fn informers(&self) -> Vec<Arc<SharedInformer>> {
        self.informers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of registered informers
    pub fn len(&self) -> usize {
        self.informers.len()
    }

    /// Whether no informer is registered
    pub fn is_empty(&self) -> bool {
        self.informers.is_empty()
    }

    /// Stop every running informer
    pub fn stop_all(&self) {
        info!("Stopping {} shared informers", self.informers.len());
        for entry in &self.informers {
            entry.value().stop();
        }
    }
}

impl<S: WatchSource> InformerRegistry for SharedInformerFactory<S> {
    fn informers_for(&self, spec: &ResolvedWatchSpec, start: bool) -> Vec<Arc<SharedInformer>> {
        spec.keys()
            .into_iter()
            .map(|key| self.informer_for(key, start))
            .collect()
    }
}

impl<S> fmt::Debug for SharedInformerFactory<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedInformerFactory")
            .field("informers", &self.informers.len())
            .finish_non_exhaustive()
    }
}
