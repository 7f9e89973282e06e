//! Resource event handlers.

use crate::declaration::HandlerDeclaration;
use kube::api::DynamicObject;

/// Receives add, update and delete notifications from a shared informer.
///
/// Handlers are shared between informers and invoked from their watch tasks,
/// so they must be `Send + Sync`. Every method defaults to doing nothing.
pub trait ResourceEventHandler: Send + Sync {
    /// An object appeared, or was already present when the handler was attached
    fn on_add(&self, _obj: &DynamicObject) {}

    /// An object changed; `old` equals `new` on periodic resync
    fn on_update(&self, _old: &DynamicObject, _new: &DynamicObject) {}

    /// An object was removed
    fn on_delete(&self, _obj: &DynamicObject) {}
}

/// A handler type that may carry a [`HandlerDeclaration`].
///
/// Types returning `None` are constructed as plain objects and never attached
/// to an informer.
pub trait DeclaredHandler: ResourceEventHandler + 'static {
    /// The declaration of this handler type
    fn declaration() -> Option<HandlerDeclaration>;
}
