//! Declarative informer binding
//!
//! Binds resource event handlers to shared Kubernetes informers. A handler
//! type declares what it wants to observe with a [`HandlerDeclaration`]; the
//! [`WatchBinder`] resolves namespaces, label selector and resource identity
//! when the handler is constructed and attaches it to one shared informer per
//! resolved namespace.
//!
//! # Example
//!
//! ```no_run
//! use informer::{
//!     DeclaredHandler, DiscoveryCache, HandlerDeclaration, KubeWatchSource,
//!     NamespaceSetting, ResourceEventHandler, SharedInformerFactory, WatchBinder,
//! };
//! use k8s_openapi::api::core::v1::Pod;
//! use kube::api::DynamicObject;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct PodLogger;
//!
//! impl ResourceEventHandler for PodLogger {
//!     fn on_add(&self, obj: &DynamicObject) {
//!         println!("pod added: {:?}", obj.metadata.name);
//!     }
//! }
//!
//! impl DeclaredHandler for PodLogger {
//!     fn declaration() -> Option<HandlerDeclaration> {
//!         Some(HandlerDeclaration::for_resource::<Pod>().namespace(NamespaceSetting::All))
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let factory = Arc::new(SharedInformerFactory::new(KubeWatchSource::new(client.clone())));
//! let discovery = Arc::new(DiscoveryCache::new(client, Duration::from_secs(1800)));
//! let binder = WatchBinder::new(factory, Some(discovery), "default");
//!
//! let logger = binder.construct(|| PodLogger).await?;
//! # drop(logger);
//! # Ok(())
//! # }
//! ```

pub mod binder;
pub mod config;
pub mod declaration;
pub mod discovery;
pub mod error;
pub mod factory;
pub mod handler;
pub mod identity;
pub mod informer;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod namespace;
pub mod selector;
pub mod source;

pub use binder::{ResolvedWatchSpec, WatchBinder};
pub use config::InformerConfig;
pub use declaration::{
    ALL_NAMESPACES, HandlerDeclaration, LabelSelectorSupplier, NamespaceSetting,
    NamespacesSupplier, Resolvable, ResourceKind,
};
pub use discovery::{DiscoveryCache, DiscoverySource};
pub use error::{InformerError, UnresolvedFields};
pub use factory::{InformerRegistry, SharedInformerFactory, WatchSource};
pub use handler::{DeclaredHandler, ResourceEventHandler};
pub use identity::{DiscoveredIdentity, IdentityLookup, IdentityTable, ResolvedIdentity, resolve_identity};
pub use informer::{InformerKey, SharedInformer};
pub use namespace::{AmbientNamespace, NamespaceSet, resolve_namespaces};
pub use selector::compose_selector;
pub use source::KubeWatchSource;
