//! # Telemetry: Observability Helpers
//!
//! A stdout subscriber for development, and a decorator that traces the
//! decisions of any [`LinkInterceptor`].

use crate::context::RequestContext;
use crate::interceptor::LinkInterceptor;
use crate::link::Link;
use crate::resource::ResourceRef;
use tracing_subscriber::EnvFilter;

/// Initialize a simple stdout tracing subscriber. `RUST_LOG` overrides the
/// default filter.
pub fn init_stdout_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,waypoint_core=debug"));

    // A subscriber may already be installed by the host or another test.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Wraps an interceptor and logs what it did to each link.
#[derive(Debug, Clone)]
pub struct Traced<I> {
    inner: I,
    name: String,
}

impl<I> Traced<I> {
    pub fn new(inner: I, name: &str) -> Self {
        Self {
            inner,
            name: name.to_string(),
        }
    }
}

impl<I: LinkInterceptor> LinkInterceptor for Traced<I> {
    fn intercept(&self, resource: ResourceRef<'_>, link: Link, ctx: &RequestContext) -> Option<Link> {
        let before = (link.rel.clone(), link.href.clone());
        let result = self.inner.intercept(resource, link, ctx);
        match &result {
            Some(after) if after.rel == before.0 && after.href == before.1 => {
                tracing::trace!(interceptor = %self.name, rel = %before.0, "Link unchanged");
            }
            Some(after) => {
                tracing::debug!(
                    interceptor = %self.name,
                    from.rel = %before.0,
                    from.href = %before.1,
                    to.rel = %after.rel,
                    to.href = %after.href,
                    "Link rewritten"
                );
            }
            None => {
                tracing::debug!(interceptor = %self.name, rel = %before.0, "Link suppressed");
            }
        }
        result
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::{IdentityInterceptor, LinkInterceptorChain};
    use crate::resource::EntityResource;
    use crate::state::Variant;
    use http::Method;

    #[test]
    fn test_traced_is_transparent() {
        init_stdout_tracing();
        let chain = LinkInterceptorChain::new().with(Traced::new(IdentityInterceptor, "identity"));
        let link = Link {
            rel: "self".into(),
            href: "http://localhost/a".into(),
            title: "a".into(),
            name: "a".into(),
            transition: None,
            target_variant: Variant::Singular,
        };
        let ctx = RequestContext::new("http://localhost", Method::GET, "/a");
        let empty = EntityResource::empty();
        assert_eq!(chain.apply(ResourceRef::Entity(&empty), link.clone(), &ctx), Some(link));
        assert_eq!(format!("{chain:?}"), "[\"identity\"]");
    }
}
