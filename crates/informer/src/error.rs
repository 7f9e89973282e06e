//! Informer binding errors.
//!
//! Namespace merging, selector composition and stream binding never fail.
//! Only identity resolution, client construction and configuration loading
//! can surface an error.

use crate::declaration::ResourceKind;
use thiserror::Error;

/// Identity fields that could not be resolved for a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnresolvedFields {
    /// The resource plural name was left to automatic resolution
    pub plural: bool,
    /// The API group was left to automatic resolution
    pub group: bool,
}

impl std::fmt::Display for UnresolvedFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.plural, self.group) {
            (true, true) => f.write_str("`resourcePlural` and `apiGroup`"),
            (true, false) => f.write_str("`resourcePlural`"),
            (false, true) => f.write_str("`apiGroup`"),
            (false, false) => f.write_str("no fields"),
        }
    }
}

/// Errors that can occur while binding a handler to its informers.
#[derive(Debug, Error)]
pub enum InformerError {
    /// Automatic identity resolution was requested but discovery is disabled
    #[error(
        "The discovery cache is disabled, provide {fields} explicitly to create a shared informer for {kind}"
    )]
    LookupServiceUnavailable {
        /// Resource type whose identity was requested
        kind: ResourceKind,
        /// Fields left to automatic resolution
        fields: UnresolvedFields,
    },

    /// Discovery was consulted but does not know the resource type
    #[error("Failed to resolve {fields} for {kind} from the discovery cache")]
    IdentityResolutionMiss {
        /// Resource type that discovery did not match
        kind: ResourceKind,
        /// Fields left to automatic resolution
        fields: UnresolvedFields,
    },

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
