use crate::media::RELATED_REL_PREFIX;
use std::sync::Arc;
use waypoint_core::{Link, LinkInterceptor, RequestContext, ResourceRef, ResourceState, StateGraph};

/// Makes hrefs relative to the service base and gives navigation links
/// the OData `related/{title}` relation. Self links keep `self`.
///
/// Applying it twice yields the same link as applying it once.
#[derive(Debug, Clone)]
pub struct ODataLinkInterceptor {
    service_document: Option<Arc<ResourceState>>,
}

impl ODataLinkInterceptor {
    pub fn new(graph: &StateGraph) -> Self {
        Self {
            service_document: graph.service_document(),
        }
    }
}

impl LinkInterceptor for ODataLinkInterceptor {
    fn intercept(&self, _resource: ResourceRef<'_>, mut link: Link, ctx: &RequestContext) -> Option<Link> {
        link.href = ctx.relativize(&link.href, self.service_document.as_deref());
        if !link.is_self() && !link.rel.starts_with(RELATED_REL_PREFIX) {
            link.rel = format!("{RELATED_REL_PREFIX}{}", link.title);
        }
        Some(link)
    }

    fn name(&self) -> &str {
        "odata"
    }
}
