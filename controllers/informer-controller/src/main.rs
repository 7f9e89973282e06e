//! Informer Controller
//!
//! Logs ConfigMap and Node events through shared informers:
//! - ConfigMaps in the namespaces and with the label selector taken from the
//!   environment
//! - Nodes cluster-wide, with the scope found through API discovery

mod controller;
mod handlers;

use controller::Controller;
use informer::{InformerConfig, InformerError};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), InformerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Informer Controller");

    // Load configuration from environment variables
    let config = InformerConfig::from_env()?;
    let ambient_namespace = config.ambient_namespace().resolve();

    info!("Configuration:");
    info!("  Ambient namespace: {}", ambient_namespace);
    info!("  Discovery: {}", if config.discovery_enabled { "enabled" } else { "disabled" });
    info!("  Discovery refresh: {}s", config.discovery_refresh.as_secs());
    info!(
        "  Watch namespaces: {}",
        if config.watch_namespaces.is_empty() {
            "ambient".to_string()
        } else {
            config.watch_namespaces.join(",")
        }
    );
    info!("  Label selector: {}", config.label_selector.as_deref().unwrap_or("none"));

    // Initialize and run controller
    let controller = Controller::new(&config, ambient_namespace).await?;
    controller.run().await;

    Ok(())
}
