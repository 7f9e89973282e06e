//! Namespace resolution.
//!
//! Merges the namespace sources of a declaration into one [`NamespaceSet`]:
//! static literals, the namespaces supplier and the fallback field are
//! unioned; the ambient namespace is only used when none of them names a
//! namespace. Any request for every namespace collapses the set to
//! [`NamespaceSet::All`].

use crate::declaration::{ALL_NAMESPACES, HandlerDeclaration, NamespaceSetting};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, trace};

/// Namespace file mounted into every pod with a service account.
pub const SERVICE_ACCOUNT_NAMESPACE_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Namespace used when nothing else is configured.
pub const DEFAULT_NAMESPACE: &str = "default";

/// The namespaces an informer watches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceSet {
    /// Every namespace; also used for cluster-scoped resources
    All,
    /// The listed namespaces
    Named(BTreeSet<String>),
}

impl NamespaceSet {
    /// A set holding a single namespace
    pub fn single(namespace: impl Into<String>) -> Self {
        Self::Named(BTreeSet::from([namespace.into()]))
    }

    /// Whether every namespace is watched
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// One entry per informer: `None` for all namespaces, `Some(ns)` per literal
    pub fn scopes(&self) -> Vec<Option<&str>> {
        match self {
            Self::All => vec![None],
            Self::Named(namespaces) => namespaces.iter().map(|ns| Some(ns.as_str())).collect(),
        }
    }
}

impl fmt::Display for NamespaceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all namespaces"),
            Self::Named(namespaces) => {
                let joined: Vec<&str> = namespaces.iter().map(String::as_str).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

/// Resolve the namespaces to watch for a declaration.
///
/// `ambient` is the namespace the process runs in; it is only used when the
/// fallback field is [`NamespaceSetting::Auto`] and no other source names a
/// namespace. Empty entries are ignored.
pub fn resolve_namespaces(declaration: &HandlerDeclaration, ambient: &str) -> NamespaceSet {
    let mut all = false;
    let mut named = BTreeSet::new();
    let mut add = |namespace: String| {
        if namespace == ALL_NAMESPACES {
            all = true;
        } else if !namespace.is_empty() {
            named.insert(namespace);
        }
    };

    declaration.namespaces.iter().cloned().for_each(&mut add);

    if let Some(supplier) = &declaration.namespaces_supplier {
        let supplied = supplier.get();
        trace!("Namespaces supplier returned {:?}", supplied);
        supplied.into_iter().for_each(&mut add);
    }

    match &declaration.namespace {
        NamespaceSetting::Auto => {}
        NamespaceSetting::All => add(ALL_NAMESPACES.to_string()),
        NamespaceSetting::Named(namespace) => add(namespace.clone()),
    }

    if all {
        return NamespaceSet::All;
    }

    if named.is_empty() {
        debug!(
            "No namespace declared for {}, using ambient namespace {}",
            declaration.resource, ambient
        );
        return NamespaceSet::single(ambient);
    }

    NamespaceSet::Named(named)
}

/// Resolves the namespace the process itself runs in.
#[derive(Debug, Clone)]
pub struct AmbientNamespace {
    configured: Option<String>,
}

impl AmbientNamespace {
    /// Create a resolver; a configured namespace takes precedence over the pod's own
    pub fn new(configured: Option<String>) -> Self {
        Self { configured }
    }

    /// Resolve using the service account namespace file of the running pod
    pub fn resolve(&self) -> String {
        self.resolve_from(Path::new(SERVICE_ACCOUNT_NAMESPACE_PATH))
    }

    /// Resolve using the given service account namespace file
    pub fn resolve_from(&self, service_account_file: &Path) -> String {
        if let Some(namespace) = self.configured.as_deref().filter(|ns| !ns.is_empty()) {
            return namespace.to_string();
        }

        match std::fs::read_to_string(service_account_file) {
            Ok(contents) if !contents.trim().is_empty() => contents.trim().to_string(),
            Ok(_) => DEFAULT_NAMESPACE.to_string(),
            Err(e) => {
                debug!(
                    "Service account namespace unavailable at {}: {}",
                    service_account_file.display(),
                    e
                );
                DEFAULT_NAMESPACE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{NamespacesSupplier, ResourceKind};

    fn declaration() -> HandlerDeclaration {
        HandlerDeclaration::new(ResourceKind::new("v1", "ConfigMap"))
    }

    fn named(namespaces: &[&str]) -> NamespaceSet {
        NamespaceSet::Named(namespaces.iter().map(|ns| (*ns).to_string()).collect())
    }

    #[test]
    fn test_static_literals_only() {
        let decl = declaration().namespaces(["team-a", "team-b"]);
        assert_eq!(resolve_namespaces(&decl, "ambient"), named(&["team-a", "team-b"]));
    }

    #[test]
    fn test_sources_are_unioned() {
        let decl = declaration()
            .namespaces(["team-a"])
            .namespaces_supplier(NamespacesSupplier::new(|| {
                vec!["team-b".to_string(), "team-a".to_string()]
            }))
            .namespace(NamespaceSetting::Named("team-c".to_string()));
        assert_eq!(
            resolve_namespaces(&decl, "ambient"),
            named(&["team-a", "team-b", "team-c"])
        );
    }

    #[test]
    fn test_auto_uses_ambient_when_nothing_declared() {
        let decl = declaration();
        assert_eq!(resolve_namespaces(&decl, "ambient"), named(&["ambient"]));
    }

    #[test]
    fn test_auto_with_empty_supplier_uses_ambient() {
        let decl = declaration().namespaces_supplier(NamespacesSupplier::new(Vec::new));
        assert_eq!(resolve_namespaces(&decl, "ambient"), named(&["ambient"]));
    }

    #[test]
    fn test_explicit_sources_win_over_ambient() {
        let decl = declaration()
            .namespaces_supplier(NamespacesSupplier::new(|| vec!["supplied".to_string()]));
        assert_eq!(resolve_namespaces(&decl, "ambient"), named(&["supplied"]));
    }

    #[test]
    fn test_explicit_fallback_alone() {
        let decl = declaration().namespace(NamespaceSetting::Named("ops".to_string()));
        assert_eq!(resolve_namespaces(&decl, "ambient"), named(&["ops"]));
    }

    #[test]
    fn test_all_fallback_collapses_everything() {
        let decl = declaration()
            .namespaces(["team-a", "team-b"])
            .namespace(NamespaceSetting::All);
        assert_eq!(resolve_namespaces(&decl, "ambient"), NamespaceSet::All);
    }

    #[test]
    fn test_all_literal_from_any_source_collapses() {
        let from_static = declaration().namespaces(["team-a", ALL_NAMESPACES]);
        assert_eq!(resolve_namespaces(&from_static, "ambient"), NamespaceSet::All);

        let from_supplier = declaration()
            .namespaces(["team-a"])
            .namespaces_supplier(NamespacesSupplier::new(|| vec![ALL_NAMESPACES.to_string()]));
        assert_eq!(resolve_namespaces(&from_supplier, "ambient"), NamespaceSet::All);

        let from_fallback =
            declaration().namespace(NamespaceSetting::Named(ALL_NAMESPACES.to_string()));
        assert_eq!(resolve_namespaces(&from_fallback, "ambient"), NamespaceSet::All);
    }

    #[test]
    fn test_empty_literals_are_ignored() {
        let decl = declaration().namespaces(["", "team-a"]);
        assert_eq!(resolve_namespaces(&decl, "ambient"), named(&["team-a"]));
    }

    #[test]
    fn test_scopes_expand_per_namespace() {
        assert_eq!(NamespaceSet::All.scopes(), vec![None]);
        assert_eq!(named(&["b", "a"]).scopes(), vec![Some("a"), Some("b")]);
    }

    #[test]
    fn test_ambient_prefers_configured_namespace() {
        let ambient = AmbientNamespace::new(Some("configured".to_string()));
        assert_eq!(ambient.resolve_from(Path::new("/nonexistent/namespace")), "configured");
    }

    #[test]
    fn test_ambient_reads_service_account_file() {
        let path = std::env::temp_dir().join(format!("informer-ns-{}", std::process::id()));
        std::fs::write(&path, "from-file\n").unwrap();
        let resolved = AmbientNamespace::new(None).resolve_from(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(resolved, "from-file");
    }

    #[test]
    fn test_ambient_defaults_without_file() {
        let ambient = AmbientNamespace::new(Some(String::new()));
        assert_eq!(
            ambient.resolve_from(Path::new("/nonexistent/namespace")),
            DEFAULT_NAMESPACE
        );
    }
}
