//! Handler declarations.
//!
//! A [`HandlerDeclaration`] describes which resources a handler type wants to
//! observe. Several fields may be left to automatic resolution; the binder
//! fills them in when the handler is constructed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Namespace literal that requests every namespace.
pub const ALL_NAMESPACES: &str = "*";

/// Identifies a resource type by `apiVersion` and `kind`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceKind {
    /// API version, e.g. `v1` or `apps/v1`
    pub api_version: String,
    /// Kind, e.g. `Pod`
    pub kind: String,
}

impl ResourceKind {
    /// Create a resource kind from its `apiVersion` and `kind`
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// Resource kind of a statically typed Kubernetes resource
    pub fn of<K>() -> Self
    where
        K: kube::Resource<DynamicType = ()>,
    {
        Self::new(K::api_version(&()), K::kind(&()))
    }

    /// API group implied by the `apiVersion` (empty for the core group)
    pub fn group(&self) -> &str {
        self.api_version
            .split_once('/')
            .map_or("", |(group, _)| group)
    }

    /// Version implied by the `apiVersion`
    pub fn version(&self) -> &str {
        self.api_version
            .split_once('/')
            .map_or(self.api_version.as_str(), |(_, version)| version)
    }

    /// Conventional list kind, e.g. `PodList`
    pub fn list_kind(&self) -> String {
        format!("{}List", self.kind)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// A value given explicitly or left to automatic resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolvable {
    /// Resolve the value through discovery
    #[default]
    Auto,
    /// Use the given value as-is
    Explicit(String),
}

impl Resolvable {
    /// Whether the value is left to automatic resolution
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    /// The explicit value, if any
    pub fn explicit(&self) -> Option<&str> {
        match self {
            Self::Auto => None,
            Self::Explicit(value) => Some(value),
        }
    }
}

/// The single fallback namespace field of a declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NamespaceSetting {
    /// Use the ambient namespace when nothing else names a namespace
    #[default]
    Auto,
    /// Watch every namespace
    All,
    /// Watch the named namespace
    Named(String),
}

/// Supplies namespaces to watch at bind time.
#[derive(Clone)]
pub struct NamespacesSupplier(Arc<dyn Fn() -> Vec<String> + Send + Sync>);

impl NamespacesSupplier {
    /// Wrap a function returning namespaces
    pub fn new(f: impl Fn() -> Vec<String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invoke the supplier
    pub fn get(&self) -> Vec<String> {
        (self.0)()
    }
}

impl fmt::Debug for NamespacesSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NamespacesSupplier(..)")
    }
}

/// Supplies a label selector fragment at bind time.
#[derive(Clone)]
pub struct LabelSelectorSupplier(Arc<dyn Fn() -> String + Send + Sync>);

impl LabelSelectorSupplier {
    /// Wrap a function returning a selector fragment
    pub fn new(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invoke the supplier
    pub fn get(&self) -> String {
        (self.0)()
    }
}

impl fmt::Debug for LabelSelectorSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LabelSelectorSupplier(..)")
    }
}

/// Declares which resources a handler type observes.
///
/// Built once per handler type and never mutated afterwards:
///
/// ```
/// use informer::{HandlerDeclaration, NamespaceSetting, ResourceKind};
/// use std::time::Duration;
///
/// let declaration = HandlerDeclaration::new(ResourceKind::new("v1", "ConfigMap"))
///     .namespaces(["team-a", "team-b"])
///     .namespace(NamespaceSetting::Auto)
///     .label_selector("app=web")
///     .resync(Duration::from_secs(300));
/// assert_eq!(declaration.list_kind, "ConfigMapList");
/// ```
#[derive(Debug, Clone)]
pub struct HandlerDeclaration {
    /// Resource type to watch
    pub resource: ResourceKind,
    /// List type of the resource
    pub list_kind: String,
    /// Plural resource name, e.g. `pods`
    pub resource_plural: Resolvable,
    /// API group, empty for the core group
    pub api_group: Resolvable,
    /// Static namespace literals
    pub namespaces: Vec<String>,
    /// Dynamically supplied namespaces
    pub namespaces_supplier: Option<NamespacesSupplier>,
    /// Fallback namespace field
    pub namespace: NamespaceSetting,
    /// Static label selector, empty for none
    pub label_selector: String,
    /// Dynamically supplied label selector fragment
    pub label_selector_supplier: Option<LabelSelectorSupplier>,
    /// Period at which cached objects are redelivered; zero disables resync
    pub resync: Duration,
}

impl HandlerDeclaration {
    /// Declare a handler for the given resource type with every field defaulted
    pub fn new(resource: ResourceKind) -> Self {
        Self {
            list_kind: resource.list_kind(),
            resource,
            resource_plural: Resolvable::Auto,
            api_group: Resolvable::Auto,
            namespaces: Vec::new(),
            namespaces_supplier: None,
            namespace: NamespaceSetting::Auto,
            label_selector: String::new(),
            label_selector_supplier: None,
            resync: Duration::ZERO,
        }
    }

    /// Declare a handler for a statically typed resource
    pub fn for_resource<K>() -> Self
    where
        K: kube::Resource<DynamicType = ()>,
    {
        Self::new(ResourceKind::of::<K>())
    }

    /// Override the list type
    #[must_use]
    pub fn list_kind(mut self, list_kind: impl Into<String>) -> Self {
        self.list_kind = list_kind.into();
        self
    }

    /// Set the plural resource name explicitly
    #[must_use]
    pub fn resource_plural(mut self, plural: impl Into<String>) -> Self {
        self.resource_plural = Resolvable::Explicit(plural.into());
        self
    }

    /// Set the API group explicitly (empty for the core group)
    #[must_use]
    pub fn api_group(mut self, group: impl Into<String>) -> Self {
        self.api_group = Resolvable::Explicit(group.into());
        self
    }

    /// Add static namespace literals
    #[must_use]
    pub fn namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces.extend(namespaces.into_iter().map(Into::into));
        self
    }

    /// Set the namespaces supplier
    #[must_use]
    pub fn namespaces_supplier(mut self, supplier: NamespacesSupplier) -> Self {
        self.namespaces_supplier = Some(supplier);
        self
    }

    /// Set the fallback namespace field
    #[must_use]
    pub fn namespace(mut self, namespace: NamespaceSetting) -> Self {
        self.namespace = namespace;
        self
    }

    /// Set the static label selector
    #[must_use]
    pub fn label_selector(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = selector.into();
        self
    }

    /// Set the label selector supplier
    #[must_use]
    pub fn label_selector_supplier(mut self, supplier: LabelSelectorSupplier) -> Self {
        self.label_selector_supplier = Some(supplier);
        self
    }

    /// Set the resync period
    #[must_use]
    pub fn resync(mut self, period: Duration) -> Self {
        self.resync = period;
        self
    }
}
