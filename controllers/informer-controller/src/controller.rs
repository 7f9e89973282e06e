//! Main controller implementation.
//!
//! Wires the informer factory, discovery and binder together, binds the
//! logging handlers and keeps the informers running until shutdown.

use crate::handlers::{ConfigMapLogger, NodeLogger};
use informer::{
    DiscoveryCache, IdentityLookup, InformerConfig, InformerError, KubeWatchSource,
    SharedInformerFactory, WatchBinder,
};
use kube::Client;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Main controller for the logging handlers.
pub struct Controller {
    factory: Arc<SharedInformerFactory<KubeWatchSource>>,
    config_maps: Arc<ConfigMapLogger>,
    nodes: Option<Arc<NodeLogger>>,
}

impl Controller {
    /// Creates a controller and binds its handlers.
    ///
    /// A Node handler that cannot be bound is reported and skipped; the
    /// ConfigMap handler must bind.
    pub async fn new(config: &InformerConfig, ambient_namespace: String) -> Result<Self, InformerError> {
        info!("Initializing Informer Controller");

        // Create Kubernetes client
        let client = Client::try_default().await?;

        let factory = Arc::new(SharedInformerFactory::new(KubeWatchSource::new(client.clone())));

        let identity_lookup: Option<Arc<dyn IdentityLookup>> = if config.discovery_enabled {
            let discovery = DiscoveryCache::new(client, config.discovery_refresh);
            // Warm the cache; lookups retry lazily if this fails
            match discovery.refresh().await {
                Ok(count) => info!("Discovery cache primed with {} resource types", count),
                Err(e) => warn!("Initial API discovery failed: {}", e),
            }
            Some(Arc::new(discovery))
        } else {
            None
        };

        let binder = WatchBinder::new(factory.clone(), identity_lookup, ambient_namespace);

        let config_maps = binder
            .bind_with(
                Some(&ConfigMapLogger::declaration(config)),
                Arc::new(ConfigMapLogger::default()),
            )
            .await?;

        let nodes = match binder.construct(NodeLogger::default).await {
            Ok(handler) => Some(handler),
            Err(e) => {
                error!("Node handler not bound: {}", e);
                None
            }
        };

        Ok(Self {
            factory,
            config_maps,
            nodes,
        })
    }

    /// Runs until ctrl-c, then stops every informer.
    pub async fn run(self) {
        info!(
            "Informer Controller running with {} shared informer(s)",
            self.factory.len()
        );

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }

        info!("Shutting down");
        self.factory.stop_all();
        info!(
            "Observed {} ConfigMap event(s) and {} Node event(s)",
            self.config_maps.events(),
            self.nodes.as_ref().map_or(0, |nodes| nodes.events())
        );
    }
}
