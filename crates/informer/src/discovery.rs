//! Discovery-backed identity lookup.
//!
//! Runs the Kubernetes discovery API lazily and keeps the result for a
//! refresh interval. Every served version of every API group is indexed, so
//! declarations may target non-preferred versions as well.

use crate::declaration::ResourceKind;
use crate::error::InformerError;
use crate::identity::{DiscoveredIdentity, IdentityLookup};
use kube::Client;
use kube::discovery::{ApiCapabilities, ApiResource, Discovery, Scope};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Default interval after which discovery is run again.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Lists the resource types served by a cluster.
#[async_trait::async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Every served resource with its capabilities, subresources included
    async fn discover(&self) -> Result<Vec<(ApiResource, ApiCapabilities)>, InformerError>;
}

#[async_trait::async_trait]
impl DiscoverySource for Client {
    async fn discover(&self) -> Result<Vec<(ApiResource, ApiCapabilities)>, InformerError> {
        debug!("Running API discovery");
        let discovery = Discovery::new(self.clone()).run().await?;
        Ok(discovery
            .groups()
            .flat_map(|group| {
                group
                    .versions()
                    .flat_map(|version| group.versioned_resources(version))
                    .collect::<Vec<_>>()
            })
            .collect())
    }
}

#[derive(Debug)]
struct Snapshot {
    fetched_at: Instant,
    entries: HashMap<ResourceKind, DiscoveredIdentity>,
}

/// Caches the cluster's discovery information.
///
/// Lookups are served from the current snapshot while a refresh runs; only
/// the very first lookup waits for discovery to complete.
pub struct DiscoveryCache {
    source: Box<dyn DiscoverySource>,
    refresh_interval: Duration,
    snapshot: RwLock<Option<Snapshot>>,
    // Held by the single task running discovery
    refreshing: Mutex<()>,
}

impl DiscoveryCache {
    /// Create a cache over a discovery source, usually a [`Client`]; discovery runs on first use
    pub fn new(source: impl DiscoverySource + 'static, refresh_interval: Duration) -> Self {
        Self {
            source: Box::new(source),
            refresh_interval,
            snapshot: RwLock::new(None),
            refreshing: Mutex::new(()),
        }
    }

    /// Run discovery now and replace the cached snapshot.
    ///
    /// Returns the number of indexed resource types.
    ///
    /// # Errors
    ///
    /// - [`InformerError::Kube`] if the discovery API cannot be queried
    pub async fn refresh(&self) -> Result<usize, InformerError> {
        let _refreshing = self.refreshing.lock().await;
        self.fetch_and_store().await
    }

    async fn fetch_and_store(&self) -> Result<usize, InformerError> {
        let entries = index_resources(self.source.discover().await?);
        let count = entries.len();
        info!("Discovered {} resource types", count);
        *self.snapshot.write().await = Some(Snapshot {
            fetched_at: Instant::now(),
            entries,
        });
        Ok(count)
    }

    fn is_stale(&self, snapshot: Option<&Snapshot>) -> bool {
        snapshot.is_none_or(|s| s.fetched_at.elapsed() >= self.refresh_interval)
    }

    async fn refresh_if_stale(&self) {
        let has_snapshot = {
            let snapshot = self.snapshot.read().await;
            if !self.is_stale(snapshot.as_ref()) {
                return;
            }
            snapshot.is_some()
        };

        // With a stale snapshot at hand, leave the refresh to whoever runs it
        let _refreshing = if has_snapshot {
            match self.refreshing.try_lock() {
                Ok(guard) => guard,
                Err(_) => return,
            }
        } else {
            self.refreshing.lock().await
        };

        // Another task may have refreshed while we waited for the lock
        if !self.is_stale(self.snapshot.read().await.as_ref()) {
            return;
        }

        if let Err(e) = self.fetch_and_store().await {
            warn!("API discovery failed, serving cached resources: {}", e);
        }
    }
}

/// Index discovered resources by `apiVersion` and `kind`, skipping subresources.
fn index_resources(
    resources: impl IntoIterator<Item = (ApiResource, ApiCapabilities)>,
) -> HashMap<ResourceKind, DiscoveredIdentity> {
    resources
        .into_iter()
        .filter(|(ar, _)| !ar.plural.contains('/'))
        .map(|(ar, caps)| {
            (
                ResourceKind::new(ar.api_version, ar.kind),
                DiscoveredIdentity {
                    group: ar.group,
                    plural: ar.plural,
                    namespaced: caps.scope == Scope::Namespaced,
                },
            )
        })
        .collect()
}

#[async_trait::async_trait]
impl IdentityLookup for DiscoveryCache {
    async fn find(&self, kind: &ResourceKind) -> Option<DiscoveredIdentity> {
        self.refresh_if_stale().await;
        self.snapshot
            .read()
            .await
            .as_ref()
            .and_then(|snapshot| snapshot.entries.get(kind).cloned())
    }
}

impl std::fmt::Debug for DiscoveryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryCache")
            .field("refresh_interval", &self.refresh_interval)
            .finish_non_exhaustive()
    }
}
