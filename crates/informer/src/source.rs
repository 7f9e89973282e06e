//! Kubernetes-backed watch source.
//!
//! Runs `kube_runtime::watcher` for an informer's key and feeds the events
//! into the informer. Reconnection is left to the watcher's default backoff.

use crate::factory::WatchSource;
use crate::informer::SharedInformer;
use futures::StreamExt;
use kube::api::DynamicObject;
use kube::{Api, Client};
use kube_runtime::{WatchStreamExt, watcher};
use std::sync::Arc;
use tokio::time::{Instant, Interval};
use tracing::{info, warn};

/// Watches the Kubernetes API server for each informer it starts.
#[derive(Clone)]
pub struct KubeWatchSource {
    client: Client,
}

impl KubeWatchSource {
    /// Create a watch source using the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for KubeWatchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeWatchSource").finish_non_exhaustive()
    }
}

impl WatchSource for KubeWatchSource {
    /// Spawn the watch task; must be called from within a Tokio runtime.
    fn start(&self, informer: Arc<SharedInformer>) {
        let key = informer.key();
        let ar = key.api_resource();
        let api: Api<DynamicObject> = match &key.namespace {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        };

        let mut config = watcher::Config::default();
        if let Some(selector) = &key.label_selector {
            config = config.labels(selector);
        }

        let task = tokio::spawn(run_informer(api, config, Arc::clone(&informer)));
        informer.set_task(task.abort_handle());
    }
}

async fn run_informer(api: Api<DynamicObject>, config: watcher::Config, informer: Arc<SharedInformer>) {
    info!("Starting informer {}", informer.key());

    let mut stream = watcher(api, config).default_backoff().boxed();
    let resync = informer.key().resync;
    let mut ticker = (!resync.is_zero())
        .then(|| tokio::time::interval_at(Instant::now() + resync, resync));

    loop {
        tokio::select! {
            event = stream.next() => match event {
                Some(Ok(event)) => informer.handle_event(event),
                Some(Err(e)) => warn!("Informer {} watch error: {}", informer.key(), e),
                None => break,
            },
            () = next_resync(ticker.as_mut()) => informer.resync(),
        }
    }

    warn!("Informer {} watch stream ended", informer.key());
}

async fn next_resync(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
