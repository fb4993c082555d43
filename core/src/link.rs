use crate::state::Variant;
use crate::transition::{Transition, TransitionId};
use std::sync::Arc;

pub const SELF_REL: &str = "self";

/// A materialized, resolvable instance of a transition for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub rel: String,
    pub href: String,
    pub title: String,
    pub name: String,
    /// `None` only for the synthetic self link.
    pub transition: Option<Arc<Transition>>,
    pub target_variant: Variant,
}

impl Link {
    pub fn from_transition(transition: &Arc<Transition>, href: String) -> Self {
        Self {
            rel: transition.link_rel(),
            href,
            title: transition.title().to_string(),
            name: transition.rel_name(),
            transition: Some(transition.clone()),
            target_variant: transition.target_variant(),
        }
    }

    pub fn transition_id(&self) -> Option<TransitionId> {
        self.transition.as_ref().map(|t| t.id)
    }

    pub fn is_self(&self) -> bool {
        self.rel == SELF_REL
    }

    pub fn is_collection(&self) -> bool {
        self.target_variant == Variant::Collection
    }
}

pub fn relativize(href: &str, base: &str) -> String {
    if base.is_empty() {
        return href.to_string();
    }
    let base_trimmed = base.trim_end_matches('/');
    match href.strip_prefix(base_trimmed) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            rest.trim_start_matches('/').to_string()
        }
        _ => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relativize() {
        let base = "http://localhost:8080/example/api/";
        assert_eq!(
            relativize("http://localhost:8080/example/api/Customers('1')", base),
            "Customers('1')"
        );
        assert_eq!(relativize("http://localhost:8080/example/api", base), "");
        assert_eq!(relativize("http://elsewhere/x", base), "http://elsewhere/x");
        // Prefix must end on a segment boundary.
        assert_eq!(
            relativize("http://localhost:8080/example/apiary", base),
            "http://localhost:8080/example/apiary"
        );
        assert_eq!(relativize("Customers('1')", base), "Customers('1')");
    }
}
