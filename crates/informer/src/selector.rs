//! Label selector composition.

use crate::declaration::HandlerDeclaration;

/// Compose the label selector of a declaration.
///
/// The static selector and the supplied fragment are joined with `,` so the
/// result matches objects satisfying both. Empty fragments count as absent;
/// `None` means no filtering.
pub fn compose_selector(declaration: &HandlerDeclaration) -> Option<String> {
    let static_selector = Some(declaration.label_selector.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let supplied = declaration
        .label_selector_supplier
        .as_ref()
        .map(|supplier| supplier.get())
        .filter(|s| !s.is_empty());

    match (static_selector, supplied) {
        (Some(base), Some(extra)) => Some(format!("{base},{extra}")),
        (base, extra) => base.or(extra),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{LabelSelectorSupplier, ResourceKind};

    fn declaration() -> HandlerDeclaration {
        HandlerDeclaration::new(ResourceKind::new("v1", "Pod"))
    }

    #[test]
    fn test_static_and_supplied_are_joined() {
        let decl = declaration()
            .label_selector("env=prod")
            .label_selector_supplier(LabelSelectorSupplier::new(|| "tier=web".to_string()));
        assert_eq!(compose_selector(&decl).as_deref(), Some("env=prod,tier=web"));
    }

    #[test]
    fn test_neither_is_absent() {
        assert_eq!(compose_selector(&declaration()), None);
    }

    #[test]
    fn test_static_only() {
        let decl = declaration().label_selector("app in (a,b)");
        assert_eq!(compose_selector(&decl).as_deref(), Some("app in (a,b)"));
    }

    #[test]
    fn test_supplied_only() {
        let decl = declaration()
            .label_selector_supplier(LabelSelectorSupplier::new(|| "tier=web".to_string()));
        assert_eq!(compose_selector(&decl).as_deref(), Some("tier=web"));
    }

    #[test]
    fn test_empty_supplied_fragment_is_absent() {
        let decl = declaration()
            .label_selector("env=prod")
            .label_selector_supplier(LabelSelectorSupplier::new(String::new));
        assert_eq!(compose_selector(&decl).as_deref(), Some("env=prod"));
    }
}
