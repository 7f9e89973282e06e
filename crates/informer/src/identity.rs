//! Resource identity resolution.
//!
//! A declaration may leave the plural resource name and the API group to
//! automatic resolution. Those are then looked up through an
//! [`IdentityLookup`], typically the [`DiscoveryCache`](crate::DiscoveryCache).

use crate::declaration::{Resolvable, ResourceKind};
use crate::error::{InformerError, UnresolvedFields};
use crate::namespace::NamespaceSet;
use kube::discovery::Scope;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Identity and scope of a resource type as reported by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredIdentity {
    /// API group, empty for the core group
    pub group: String,
    /// Plural resource name
    pub plural: String,
    /// Whether the resource is namespaced
    pub namespaced: bool,
}

/// Maps resource types to their identity.
///
/// A lookup that finds nothing returns `None`; implementations never fail.
#[async_trait::async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Find the identity of the given resource type
    async fn find(&self, kind: &ResourceKind) -> Option<DiscoveredIdentity>;
}

/// Fully resolved identity of a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// Plural resource name
    pub plural: String,
    /// API group
    pub group: String,
    /// Namespace set that must replace the declared one, for cluster-scoped kinds
    pub scope_override: Option<NamespaceSet>,
}

/// Resolve the plural name and group of a resource type.
///
/// Explicit values are returned as-is without consulting `lookup`. Otherwise
/// the lookup fills in the fields left to automatic resolution, and a
/// cluster-scoped result yields a scope override to [`NamespaceSet::All`].
///
/// # Errors
///
/// - [`InformerError::LookupServiceUnavailable`] if resolution is needed but `lookup` is `None`
/// - [`InformerError::IdentityResolutionMiss`] if the lookup does not know the resource type
pub async fn resolve_identity(
    kind: &ResourceKind,
    plural: &Resolvable,
    group: &Resolvable,
    lookup: Option<&dyn IdentityLookup>,
) -> Result<ResolvedIdentity, InformerError> {
    if let (Some(plural), Some(group)) = (plural.explicit(), group.explicit()) {
        trace!("Identity of {} given explicitly", kind);
        return Ok(ResolvedIdentity {
            plural: plural.to_string(),
            group: group.to_string(),
            scope_override: None,
        });
    }

    let fields = UnresolvedFields {
        plural: plural.is_auto(),
        group: group.is_auto(),
    };

    let lookup = lookup.ok_or_else(|| InformerError::LookupServiceUnavailable {
        kind: kind.clone(),
        fields,
    })?;

    let discovered = lookup
        .find(kind)
        .await
        .ok_or_else(|| InformerError::IdentityResolutionMiss {
            kind: kind.clone(),
            fields,
        })?;

    debug!(
        "Discovered {} as {}/{} (namespaced: {})",
        kind, discovered.group, discovered.plural, discovered.namespaced
    );

    Ok(ResolvedIdentity {
        plural: plural.explicit().map_or(discovered.plural, str::to_string),
        group: group.explicit().map_or(discovered.group, str::to_string),
        scope_override: (!discovered.namespaced).then_some(NamespaceSet::All),
    })
}

/// In-memory identity lookup for statically known resource types.
#[derive(Debug, Clone, Default)]
pub struct IdentityTable {
    entries: HashMap<ResourceKind, DiscoveredIdentity>,
}

impl IdentityTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry
    pub fn insert(&mut self, kind: ResourceKind, identity: DiscoveredIdentity) {
        self.entries.insert(kind, identity);
    }

    /// Register a statically typed resource with the given scope
    pub fn register<K>(&mut self, scope: Scope) -> &mut Self
    where
        K: kube::Resource<DynamicType = ()>,
    {
        self.insert(
            ResourceKind::of::<K>(),
            DiscoveredIdentity {
                group: K::group(&()).to_string(),
                plural: K::plural(&()).to_string(),
                namespaced: scope == Scope::Namespaced,
            },
        );
        self
    }

    /// Number of known resource types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Table seeded with common built-in resource types
    pub fn builtin() -> Self {
        use k8s_openapi::api::{
            apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
            batch::v1::{CronJob, Job},
            core::v1::{
                ConfigMap, Endpoints, Event, Namespace, Node, PersistentVolume,
                PersistentVolumeClaim, Pod, Secret, Service, ServiceAccount,
            },
            networking::v1::{Ingress, NetworkPolicy},
            rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding},
            storage::v1::StorageClass,
        };

        let mut table = Self::new();
        table
            .register::<Pod>(Scope::Namespaced)
            .register::<Service>(Scope::Namespaced)
            .register::<ConfigMap>(Scope::Namespaced)
            .register::<Secret>(Scope::Namespaced)
            .register::<Event>(Scope::Namespaced)
            .register::<ServiceAccount>(Scope::Namespaced)
            .register::<Endpoints>(Scope::Namespaced)
            .register::<PersistentVolumeClaim>(Scope::Namespaced)
            .register::<Node>(Scope::Cluster)
            .register::<Namespace>(Scope::Cluster)
            .register::<PersistentVolume>(Scope::Cluster)
            .register::<Deployment>(Scope::Namespaced)
            .register::<StatefulSet>(Scope::Namespaced)
            .register::<DaemonSet>(Scope::Namespaced)
            .register::<ReplicaSet>(Scope::Namespaced)
            .register::<Job>(Scope::Namespaced)
            .register::<CronJob>(Scope::Namespaced)
            .register::<Ingress>(Scope::Namespaced)
            .register::<NetworkPolicy>(Scope::Namespaced)
            .register::<StorageClass>(Scope::Cluster)
            .register::<Role>(Scope::Namespaced)
            .register::<RoleBinding>(Scope::Namespaced)
            .register::<ClusterRole>(Scope::Cluster)
            .register::<ClusterRoleBinding>(Scope::Cluster);
        table
    }
}

#[async_trait::async_trait]
impl IdentityLookup for IdentityTable {
    async fn find(&self, kind: &ResourceKind) -> Option<DiscoveredIdentity> {
        self.entries.get(kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::CountingLookup;
    use k8s_openapi::api::core::v1::{Node, Pod};

    fn widget() -> ResourceKind {
        ResourceKind::new("example.io/v1", "Widget")
    }

    fn widget_lookup(namespaced: bool) -> CountingLookup {
        let mut table = IdentityTable::new();
        table.insert(
            widget(),
            DiscoveredIdentity {
                group: "example.io".to_string(),
                plural: "widgets".to_string(),
                namespaced,
            },
        );
        CountingLookup::new(table)
    }

    #[tokio::test]
    async fn test_explicit_identity_skips_lookup() {
        let lookup = widget_lookup(false);
        let resolved = resolve_identity(
            &widget(),
            &Resolvable::Explicit("gadgets".to_string()),
            &Resolvable::Explicit("other.io".to_string()),
            Some(&lookup),
        )
        .await
        .unwrap();

        assert_eq!(resolved.plural, "gadgets");
        assert_eq!(resolved.group, "other.io");
        assert_eq!(resolved.scope_override, None);
        assert_eq!(lookup.calls(), 0, "lookup must not be consulted");
    }

    #[tokio::test]
    async fn test_explicit_identity_without_lookup() {
        let resolved = resolve_identity(
            &widget(),
            &Resolvable::Explicit("widgets".to_string()),
            &Resolvable::Explicit("example.io".to_string()),
            None,
        )
        .await
        .unwrap();
        assert_eq!(resolved.plural, "widgets");
    }

    #[tokio::test]
    async fn test_missing_plural_filled_from_lookup() {
        let lookup = widget_lookup(true);
        let resolved = resolve_identity(
            &widget(),
            &Resolvable::Auto,
            &Resolvable::Explicit("example.io".to_string()),
            Some(&lookup),
        )
        .await
        .unwrap();

        assert_eq!(resolved.plural, "widgets");
        assert_eq!(resolved.group, "example.io");
        assert_eq!(resolved.scope_override, None);
        assert_eq!(lookup.calls(), 1);
    }

    #[tokio::test]
    async fn test_explicit_field_not_overwritten_by_lookup() {
        let lookup = widget_lookup(true);
        let resolved = resolve_identity(
            &widget(),
            &Resolvable::Explicit("custom-widgets".to_string()),
            &Resolvable::Auto,
            Some(&lookup),
        )
        .await
        .unwrap();

        assert_eq!(resolved.plural, "custom-widgets");
        assert_eq!(resolved.group, "example.io");
    }

    #[tokio::test]
    async fn test_lookup_miss_fails() {
        let lookup = CountingLookup::new(IdentityTable::new());
        let err = resolve_identity(&widget(), &Resolvable::Auto, &Resolvable::Auto, Some(&lookup))
            .await
            .unwrap_err();

        match err {
            InformerError::IdentityResolutionMiss { kind, fields } => {
                assert_eq!(kind, widget());
                assert!(fields.plural && fields.group);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_disabled_lookup_fails() {
        let err = resolve_identity(
            &widget(),
            &Resolvable::Explicit("widgets".to_string()),
            &Resolvable::Auto,
            None,
        )
        .await
        .unwrap_err();

        match err {
            InformerError::LookupServiceUnavailable { fields, .. } => {
                assert!(!fields.plural);
                assert!(fields.group);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cluster_scoped_kind_overrides_namespaces() {
        let lookup = widget_lookup(false);
        let resolved = resolve_identity(&widget(), &Resolvable::Auto, &Resolvable::Auto, Some(&lookup))
            .await
            .unwrap();
        assert_eq!(resolved.scope_override, Some(NamespaceSet::All));
    }

    #[tokio::test]
    async fn test_builtin_table_knows_core_kinds() {
        let table = IdentityTable::builtin();
        let pod = table.find(&ResourceKind::of::<Pod>()).await.unwrap();
        assert_eq!(pod.plural, "pods");
        assert_eq!(pod.group, "");
        assert!(pod.namespaced);

        let node = table.find(&ResourceKind::of::<Node>()).await.unwrap();
        assert!(!node.namespaced);
    }
}
