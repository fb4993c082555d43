//! # HypermediaEngine
//!
//! Wires the output pipeline together: resolve links for an entity or
//! collection, expand pre-fetched relations into embeddings, then run the
//! interceptor chain. Codecs take the result from here.

use crate::config::EngineConfig;
use crate::context::RequestContext;
use crate::embed::EmbeddingExpander;
use crate::error::EngineResult;
use crate::graph::StateGraph;
use crate::interceptor::{LinkInterceptor, LinkInterceptorChain};
use crate::resolver::LinkResolver;
use crate::resource::{CollectionResource, EntityPayload, EntityResource, RestResource};
use crate::state::ResourceState;
use crate::template::extract_path;
use http::Method;
use std::sync::Arc;

/// Where a request landed: the addressed state and its context.
#[derive(Debug, Clone)]
pub struct Route {
    pub state: Arc<ResourceState>,
    pub ctx: RequestContext,
}

#[derive(Debug, Clone)]
pub struct HypermediaEngine {
    graph: Arc<StateGraph>,
    config: EngineConfig,
    resolver: LinkResolver,
    expander: EmbeddingExpander,
    chain: LinkInterceptorChain,
}

impl HypermediaEngine {
    pub fn new(graph: Arc<StateGraph>, config: EngineConfig) -> Self {
        let resolver = LinkResolver::new(graph.clone()).with_default_id(config.default_id_path_element.clone());
        let expander = EmbeddingExpander::new(resolver.clone()).with_max_depth(config.max_embed_depth);
        Self {
            graph,
            config,
            resolver,
            expander,
            chain: LinkInterceptorChain::new(),
        }
    }

    pub fn with_interceptor(mut self, interceptor: impl LinkInterceptor + 'static) -> Self {
        self.chain = self.chain.with(interceptor);
        self
    }

    pub fn graph(&self) -> &Arc<StateGraph> {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &LinkResolver {
        &self.resolver
    }

    pub fn chain(&self) -> &LinkInterceptorChain {
        &self.chain
    }

    /// Resolve the addressed state and bind its path parameters.
    pub fn route(&self, method: &Method, path: &str) -> EngineResult<Option<Route>> {
        let Some(state) = self.graph.resolve(method, path)? else {
            return Ok(None);
        };
        let relative = self.graph.strip_base(path);
        let params = extract_path(&relative, &state.path)?;
        let ctx = RequestContext::new(self.config.base_uri.clone(), method.clone(), relative).with_path_params(params);
        Ok(Some(Route { state, ctx }))
    }

    pub fn render_entity(
        &self,
        state: &Arc<ResourceState>,
        entity: impl Into<EntityPayload>,
        ctx: &RequestContext,
    ) -> RestResource {
        let mut resource = EntityResource::new(entity);
        if resource.entity_name.is_none() {
            resource.entity_name = state.entity_name.clone();
        }
        self.resolver.resolve_entity(state, &mut resource, ctx);
        self.finish(resource.into(), ctx)
    }

    pub fn render_collection(
        &self,
        state: &Arc<ResourceState>,
        entities: Vec<EntityPayload>,
        ctx: &RequestContext,
    ) -> RestResource {
        let members = entities.into_iter().map(EntityResource::new).collect();
        let mut resource = CollectionResource::new(state.entity_name.clone().unwrap_or_default(), members);
        self.resolver.resolve_collection(state, &mut resource, ctx);
        self.finish(resource.into(), ctx)
    }

    /// Links only: for states without entity data, such as the service document.
    pub fn render_state(&self, state: &Arc<ResourceState>, ctx: &RequestContext) -> RestResource {
        let mut resource = EntityResource::empty();
        resource.entity_name = Some(state.entity_name.clone().unwrap_or_else(|| state.name.clone()));
        self.resolver.resolve_entity(state, &mut resource, ctx);
        self.finish(resource.into(), ctx)
    }

    fn finish(&self, mut resource: RestResource, ctx: &RequestContext) -> RestResource {
        self.expander.expand(&mut resource, ctx);
        self.chain.process(&mut resource, ctx);
        resource
    }
}
