//! Handler binding.
//!
//! [`WatchBinder`] turns a [`HandlerDeclaration`] into a [`ResolvedWatchSpec`]
//! and attaches the handler to the shared informers for that spec. Each call
//! resolves from scratch and holds no state of its own, so binding is safe
//! from any number of concurrent tasks; sharing is left to the registry.

use crate::declaration::{HandlerDeclaration, NamespaceSetting, ResourceKind};
use crate::error::InformerError;
use crate::handler::{DeclaredHandler, ResourceEventHandler};
use crate::factory::InformerRegistry;
use crate::identity::{IdentityLookup, resolve_identity};
use crate::informer::InformerKey;
use crate::namespace::{NamespaceSet, resolve_namespaces};
use crate::selector::compose_selector;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Fully resolved watch specification of one handler construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWatchSpec {
    /// Resource type
    pub resource: ResourceKind,
    /// List type
    pub list_kind: String,
    /// Plural resource name
    pub plural: String,
    /// API group
    pub group: String,
    /// Namespaces to watch; never empty
    pub namespaces: NamespaceSet,
    /// Composed label selector
    pub label_selector: Option<String>,
    /// Resync period
    pub resync: Duration,
}

impl ResolvedWatchSpec {
    /// Informer key for one namespace (`None` for all namespaces)
    pub fn key_for(&self, namespace: Option<&str>) -> InformerKey {
        InformerKey {
            resource: self.resource.clone(),
            list_kind: self.list_kind.clone(),
            group: self.group.clone(),
            plural: self.plural.clone(),
            namespace: namespace.map(str::to_string),
            label_selector: self.label_selector.clone(),
            resync: self.resync,
        }
    }

    /// One informer key per watched namespace
    pub fn keys(&self) -> Vec<InformerKey> {
        self.namespaces
            .scopes()
            .into_iter()
            .map(|namespace| self.key_for(namespace))
            .collect()
    }
}

fn declares_namespaces(declaration: &HandlerDeclaration) -> bool {
    !declaration.namespaces.is_empty()
        || declaration.namespaces_supplier.is_some()
        || declaration.namespace != NamespaceSetting::Auto
}

/// Binds declared handlers to shared informers.
pub struct WatchBinder {
    registry: Arc<dyn InformerRegistry>,
    identity_lookup: Option<Arc<dyn IdentityLookup>>,
    ambient_namespace: String,
}

impl WatchBinder {
    /// Create a binder.
    ///
    /// `identity_lookup` is `None` when discovery is disabled; declarations
    /// must then name their plural and API group explicitly.
    pub fn new(
        registry: Arc<dyn InformerRegistry>,
        identity_lookup: Option<Arc<dyn IdentityLookup>>,
        ambient_namespace: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            identity_lookup,
            ambient_namespace: ambient_namespace.into(),
        }
    }

    /// Namespace used for declarations that name none
    pub fn ambient_namespace(&self) -> &str {
        &self.ambient_namespace
    }

    /// Resolve a declaration into a watch specification.
    ///
    /// # Errors
    ///
    /// Fails if the identity of the resource cannot be resolved, see
    /// [`resolve_identity`].
    pub async fn resolve(
        &self,
        declaration: &HandlerDeclaration,
    ) -> Result<ResolvedWatchSpec, InformerError> {
        let namespaces = resolve_namespaces(declaration, &self.ambient_namespace);
        let label_selector = compose_selector(declaration);

        let identity = resolve_identity(
            &declaration.resource,
            &declaration.resource_plural,
            &declaration.api_group,
            self.identity_lookup.as_deref(),
        )
        .await?;

        let namespaces = match identity.scope_override {
            Some(scope) => {
                if !namespaces.is_all() && declares_namespaces(declaration) {
                    warn!(
                        "{} is cluster-scoped, ignoring declared namespaces [{}] and watching {}",
                        declaration.resource, namespaces, scope
                    );
                } else {
                    debug!("{} is cluster-scoped, watching {}", declaration.resource, scope);
                }
                scope
            }
            None => namespaces,
        };

        Ok(ResolvedWatchSpec {
            resource: declaration.resource.clone(),
            list_kind: declaration.list_kind.clone(),
            plural: identity.plural,
            group: identity.group,
            namespaces,
            label_selector,
            resync: declaration.resync,
        })
    }

    /// Bind a handler instance according to a declaration.
    ///
    /// Without a declaration the handler is returned untouched.
    ///
    /// # Errors
    ///
    /// Fails if the identity of the resource cannot be resolved; the handler
    /// is then not attached anywhere.
    pub async fn bind_with<H>(
        &self,
        declaration: Option<&HandlerDeclaration>,
        handler: Arc<H>,
    ) -> Result<Arc<H>, InformerError>
    where
        H: ResourceEventHandler + 'static,
    {
        let Some(declaration) = declaration else {
            error!(
                "Failed to create informer for [{}] that implements ResourceEventHandler: no handler declaration",
                type_name::<H>()
            );
            return Ok(handler);
        };

        let spec = self.resolve(declaration).await?;
        Ok(self.attach(&spec, handler))
    }

    /// Bind a handler instance using its type's declaration.
    ///
    /// # Errors
    ///
    /// See [`WatchBinder::bind_with`].
    pub async fn bind<H: DeclaredHandler>(&self, handler: Arc<H>) -> Result<Arc<H>, InformerError> {
        self.bind_with(H::declaration().as_ref(), handler).await
    }

    /// Resolve the declaration of `H`, then construct and bind the handler.
    ///
    /// The constructor only runs once resolution has succeeded.
    ///
    /// # Errors
    ///
    /// See [`WatchBinder::bind_with`].
    pub async fn construct<H, F>(&self, constructor: F) -> Result<Arc<H>, InformerError>
    where
        H: DeclaredHandler,
        F: FnOnce() -> H + Send,
    {
        let Some(declaration) = H::declaration() else {
            return self.bind_with(None, Arc::new(constructor())).await;
        };

        let spec = self.resolve(&declaration).await?;
        Ok(self.attach(&spec, Arc::new(constructor())))
    }

    fn attach<H>(&self, spec: &ResolvedWatchSpec, handler: Arc<H>) -> Arc<H>
    where
        H: ResourceEventHandler + 'static,
    {
        let informers = self.registry.informers_for(spec, true);
        let listener: Arc<dyn ResourceEventHandler> = handler.clone();
        for informer in &informers {
            informer.add_event_handler(Arc::clone(&listener));
        }

        info!(
            "Bound [{}] to {} informer(s) for {}.{} in {}",
            type_name::<H>(),
            informers.len(),
            spec.plural,
            spec.group,
            spec.namespaces
        );
        handler
    }
}

impl fmt::Debug for WatchBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBinder")
            .field("discovery", &self.identity_lookup.is_some())
            .field("ambient_namespace", &self.ambient_namespace)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{LabelSelectorSupplier, NamespacesSupplier};
    use crate::factory::SharedInformerFactory;
    use crate::identity::IdentityTable;
    use crate::mock::{CountingLookup, RecordingHandler, RecordingWatchSource};
    use k8s_openapi::api::core::v1::{ConfigMap, Node};
    use std::collections::BTreeSet;

    struct Fixture {
        factory: Arc<SharedInformerFactory<RecordingWatchSource>>,
        source: RecordingWatchSource,
        lookup: Arc<CountingLookup>,
        binder: WatchBinder,
    }

    fn fixture(discovery: bool) -> Fixture {
        let source = RecordingWatchSource::default();
        let factory = Arc::new(SharedInformerFactory::new(source.clone()));
        let lookup = Arc::new(CountingLookup::new(IdentityTable::builtin()));
        let identity_lookup: Option<Arc<dyn IdentityLookup>> = if discovery {
            Some(lookup.clone() as Arc<dyn IdentityLookup>)
        } else {
            None
        };
        let binder = WatchBinder::new(factory.clone(), identity_lookup, "ambient");
        Fixture {
            factory,
            source,
            lookup,
            binder,
        }
    }

    fn named(namespaces: &[&str]) -> NamespaceSet {
        NamespaceSet::Named(namespaces.iter().map(|ns| (*ns).to_string()).collect::<BTreeSet<_>>())
    }

    #[tokio::test]
    async fn test_bind_resolves_and_attaches() {
        let f = fixture(true);
        let declaration = HandlerDeclaration::for_resource::<ConfigMap>()
            .namespaces(["team-a"])
            .namespaces_supplier(NamespacesSupplier::new(|| vec!["team-b".to_string()]))
            .label_selector("env=prod")
            .label_selector_supplier(LabelSelectorSupplier::new(|| "tier=web".to_string()))
            .resync(Duration::from_secs(60));
        let handler = Arc::new(RecordingHandler::default());

        let bound = f.binder.bind_with(Some(&declaration), handler.clone()).await.unwrap();

        assert!(Arc::ptr_eq(&bound, &handler));
        assert_eq!(f.factory.len(), 2);
        assert_eq!(f.source.starts(), 2);
        for informer in f.factory.informers() {
            let key = informer.key();
            assert_eq!(key.plural, "configmaps");
            assert_eq!(key.group, "");
            assert_eq!(key.label_selector.as_deref(), Some("env=prod,tier=web"));
            assert_eq!(key.resync, Duration::from_secs(60));
            assert_eq!(informer.handler_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_resolve_uses_ambient_namespace() {
        let f = fixture(true);
        let spec = f
            .binder
            .resolve(&HandlerDeclaration::for_resource::<ConfigMap>())
            .await
            .unwrap();
        assert_eq!(f.binder.ambient_namespace(), "ambient");
        assert_eq!(spec.namespaces, named(&[f.binder.ambient_namespace()]));
        assert_eq!(spec.label_selector, None);
        assert_eq!(spec.list_kind, "ConfigMapList");
    }

    #[tokio::test]
    async fn test_cluster_scope_overrides_declared_namespaces() {
        let f = fixture(true);
        let declaration = HandlerDeclaration::for_resource::<Node>().namespaces(["team-a", "team-b"]);
        let spec = f.binder.resolve(&declaration).await.unwrap();

        assert_eq!(spec.namespaces, NamespaceSet::All);
        assert_eq!(spec.plural, "nodes");
        assert_eq!(spec.keys().len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_identity_never_consults_lookup() {
        let f = fixture(true);
        let declaration = HandlerDeclaration::for_resource::<ConfigMap>()
            .resource_plural("configmaps")
            .api_group("");
        f.binder
            .bind_with(Some(&declaration), Arc::new(RecordingHandler::default()))
            .await
            .unwrap();
        assert_eq!(f.lookup.calls(), 0);
    }

    #[tokio::test]
    async fn test_explicit_identity_works_without_discovery() {
        let f = fixture(false);
        let declaration = HandlerDeclaration::for_resource::<ConfigMap>()
            .resource_plural("configmaps")
            .api_group("");
        f.binder
            .bind_with(Some(&declaration), Arc::new(RecordingHandler::default()))
            .await
            .unwrap();
        assert_eq!(f.factory.len(), 1);
    }

    #[tokio::test]
    async fn test_auto_identity_without_discovery_fails_before_registry() {
        let f = fixture(false);
        let declaration = HandlerDeclaration::for_resource::<ConfigMap>();
        let err = f
            .binder
            .bind_with(Some(&declaration), Arc::new(RecordingHandler::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, InformerError::LookupServiceUnavailable { .. }));
        assert!(f.factory.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_miss_fails_before_registry() {
        let f = fixture(true);
        let declaration = HandlerDeclaration::new(ResourceKind::new("example.io/v1", "Widget"));
        let err = f
            .binder
            .bind_with(Some(&declaration), Arc::new(RecordingHandler::default()))
            .await
            .unwrap_err();

        assert!(matches!(err, InformerError::IdentityResolutionMiss { .. }));
        assert!(f.factory.is_empty());
        assert_eq!(f.source.starts(), 0);
    }

    #[tokio::test]
    async fn test_missing_declaration_passes_through() {
        let f = fixture(true);
        let handler = Arc::new(RecordingHandler::default());
        let bound = f.binder.bind_with(None, handler.clone()).await.unwrap();

        assert!(Arc::ptr_eq(&bound, &handler));
        assert!(f.factory.is_empty());
        assert_eq!(f.source.starts(), 0);
        assert_eq!(f.lookup.calls(), 0);
    }

    #[test]
    fn test_keys_follow_namespaces() {
        let spec = ResolvedWatchSpec {
            resource: ResourceKind::new("v1", "Pod"),
            list_kind: "PodList".to_string(),
            plural: "pods".to_string(),
            group: String::new(),
            namespaces: named(&["b", "a"]),
            label_selector: None,
            resync: Duration::ZERO,
        };
        let namespaces: Vec<_> = spec.keys().into_iter().map(|key| key.namespace).collect();
        assert_eq!(namespaces, vec![Some("a".to_string()), Some("b".to_string())]);
    }
}
