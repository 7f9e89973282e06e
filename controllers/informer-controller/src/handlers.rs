//! Logging event handlers.

use informer::{
    DeclaredHandler, HandlerDeclaration, InformerConfig, LabelSelectorSupplier, NamespacesSupplier,
    ResourceEventHandler,
};
use k8s_openapi::api::core::v1::{ConfigMap, Node};
use kube::ResourceExt;
use kube::api::DynamicObject;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Logs ConfigMap changes.
///
/// Namespaces and label selector come from configuration through suppliers,
/// so they are read when the handler is bound.
#[derive(Debug, Default)]
pub struct ConfigMapLogger {
    events: AtomicUsize,
}

impl ConfigMapLogger {
    /// Declaration driven by `INFORMER_WATCH_NAMESPACES` and `INFORMER_LABEL_SELECTOR`
    pub fn declaration(config: &InformerConfig) -> HandlerDeclaration {
        let namespaces = config.watch_namespaces.clone();
        let selector = config.label_selector.clone().unwrap_or_default();

        HandlerDeclaration::for_resource::<ConfigMap>()
            .namespaces_supplier(NamespacesSupplier::new(move || namespaces.clone()))
            .label_selector_supplier(LabelSelectorSupplier::new(move || selector.clone()))
    }

    /// Number of events observed
    pub fn events(&self) -> usize {
        self.events.load(Ordering::Relaxed)
    }
}

impl ResourceEventHandler for ConfigMapLogger {
    fn on_add(&self, obj: &DynamicObject) {
        self.events.fetch_add(1, Ordering::Relaxed);
        info!(
            namespace = %obj.namespace().unwrap_or_default(),
            name = %obj.name_any(),
            keys = obj.data.get("data").and_then(|d| d.as_object()).map_or(0, |d| d.len()),
            "ConfigMap added"
        );
    }

    fn on_update(&self, _old: &DynamicObject, new: &DynamicObject) {
        self.events.fetch_add(1, Ordering::Relaxed);
        info!(
            namespace = %new.namespace().unwrap_or_default(),
            name = %new.name_any(),
            resource_version = %new.resource_version().unwrap_or_default(),
            "ConfigMap updated"
        );
    }

    fn on_delete(&self, obj: &DynamicObject) {
        self.events.fetch_add(1, Ordering::Relaxed);
        info!(
            namespace = %obj.namespace().unwrap_or_default(),
            name = %obj.name_any(),
            "ConfigMap deleted"
        );
    }
}

/// Logs Node changes across the cluster.
#[derive(Debug, Default)]
pub struct NodeLogger {
    events: AtomicUsize,
}

impl NodeLogger {
    /// Number of events observed
    pub fn events(&self) -> usize {
        self.events.load(Ordering::Relaxed)
    }
}

impl ResourceEventHandler for NodeLogger {
    fn on_add(&self, obj: &DynamicObject) {
        self.events.fetch_add(1, Ordering::Relaxed);
        info!(name = %obj.name_any(), "Node added");
    }

    fn on_update(&self, old: &DynamicObject, new: &DynamicObject) {
        self.events.fetch_add(1, Ordering::Relaxed);
        if old.labels() != new.labels() {
            info!(name = %new.name_any(), "Node labels changed");
        }
    }

    fn on_delete(&self, obj: &DynamicObject) {
        self.events.fetch_add(1, Ordering::Relaxed);
        info!(name = %obj.name_any(), "Node deleted");
    }
}

impl DeclaredHandler for NodeLogger {
    // Scope and plural are left to discovery
    fn declaration() -> Option<HandlerDeclaration> {
        Some(HandlerDeclaration::for_resource::<Node>())
    }
}
