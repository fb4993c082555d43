//! Ordered link interceptors.
//!
//! Each interceptor sees one link at a time and returns it (possibly
//! rewritten) or `None` to suppress it. Interceptors must be pure: the
//! same link can be visited again at another embedding depth, and one
//! chain instance is shared by concurrent requests.

use crate::context::RequestContext;
use crate::link::Link;
use crate::resource::{CollectionResource, EntityResource, ResourceRef, RestResource};
use std::fmt;
use std::sync::Arc;

pub trait LinkInterceptor: Send + Sync {
    fn intercept(&self, resource: ResourceRef<'_>, link: Link, ctx: &RequestContext) -> Option<Link>;

    /// Name used in traces.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Passes every link through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityInterceptor;

impl LinkInterceptor for IdentityInterceptor {
    fn intercept(&self, _resource: ResourceRef<'_>, link: Link, _ctx: &RequestContext) -> Option<Link> {
        Some(link)
    }
}

/// Interceptors applied in registration order. An empty chain is the identity.
#[derive(Clone, Default)]
pub struct LinkInterceptorChain {
    interceptors: Vec<Arc<dyn LinkInterceptor>>,
}

impl LinkInterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, interceptor: impl LinkInterceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run `link` through every interceptor; stops at the first suppression.
    pub fn apply(&self, resource: ResourceRef<'_>, link: Link, ctx: &RequestContext) -> Option<Link> {
        let mut current = link;
        for interceptor in &self.interceptors {
            let rel = current.rel.clone();
            match interceptor.intercept(resource, current, ctx) {
                Some(next) => current = next,
                None => {
                    tracing::debug!(interceptor = interceptor.name(), %rel, "Link suppressed");
                    return None;
                }
            }
        }
        Some(current)
    }

    /// Replace every link in `resource`, its members and its embeddings
    /// with the chain's output. Relative order of kept links is preserved.
    pub fn process(&self, resource: &mut RestResource, ctx: &RequestContext) {
        match resource {
            RestResource::Entity(entity) => self.process_entity(entity, ctx),
            RestResource::Collection(collection) => self.process_collection(collection, ctx),
        }
    }

    pub fn process_entity(&self, resource: &mut EntityResource, ctx: &RequestContext) {
        let links = std::mem::take(&mut resource.links);
        resource.links = self.filter(ResourceRef::Entity(&*resource), links, ctx);
        for embedded in resource.embedded.values_mut() {
            self.process(embedded, ctx);
        }
    }

    pub fn process_collection(&self, resource: &mut CollectionResource, ctx: &RequestContext) {
        let links = std::mem::take(&mut resource.links);
        resource.links = self.filter(ResourceRef::Collection(&*resource), links, ctx);
        for member in &mut resource.entities {
            self.process_entity(member, ctx);
        }
        for embedded in resource.embedded.values_mut() {
            self.process(embedded, ctx);
        }
    }

    fn filter(&self, resource: ResourceRef<'_>, links: Vec<Link>, ctx: &RequestContext) -> Vec<Link> {
        if self.interceptors.is_empty() {
            return links;
        }
        links
            .into_iter()
            .filter_map(|link| self.apply(resource, link, ctx))
            .collect()
    }
}

impl fmt::Debug for LinkInterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.interceptors.iter().map(|i| i.name()))
            .finish()
    }
}
