//! # LinkResolver - Outbound Links for One Entity
//!
//! For a `(state, entity)` pair the resolver emits the self link first,
//! then one link per applicable transition leaving `state`, in declaration
//! order. A transition whose condition fails, or whose target template has
//! a variable the entity data cannot fill, is omitted without error.
//!
//! Values used to fill templates ("bindings") come from, lowest priority
//! first: path parameters already bound from the request, the entity's
//! properties, and (for typed entities) the entity key bound to the
//! state's id parameter.

use crate::context::RequestContext;
use crate::graph::StateGraph;
use crate::link::{Link, SELF_REL};
use crate::resource::{CollectionResource, EntityPayload, EntityResource};
use crate::state::ResourceState;
use crate::transition::{Bindings, Transition};
use std::sync::Arc;

pub const DEFAULT_ID_PATH_ELEMENT: &str = "id";

#[derive(Debug, Clone)]
pub struct LinkResolver {
    graph: Arc<StateGraph>,
    default_id: String,
}

impl LinkResolver {
    pub fn new(graph: Arc<StateGraph>) -> Self {
        Self {
            graph,
            default_id: DEFAULT_ID_PATH_ELEMENT.to_string(),
        }
    }

    pub fn with_default_id(mut self, default_id: impl Into<String>) -> Self {
        self.default_id = default_id.into();
        self
    }

    pub fn graph(&self) -> &Arc<StateGraph> {
        &self.graph
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    pub fn bindings(
        &self,
        state: &ResourceState,
        entity: Option<&EntityPayload>,
        ctx: &RequestContext,
    ) -> Bindings {
        let mut bindings = ctx.path_params.clone();
        match entity {
            Some(EntityPayload::Generic(entity)) => {
                for (name, value) in &entity.properties {
                    if let Some(text) = value.as_path_value() {
                        bindings.insert(name.clone(), text);
                    }
                }
            }
            Some(EntityPayload::Typed(entity)) => {
                for (name, value) in &entity.properties {
                    if let Some(text) = value.as_path_value() {
                        bindings.insert(name.clone(), text);
                    }
                }
                if let Some(key) = &entity.key {
                    bindings.insert(
                        state.path_id_parameter_or(&self.default_id).to_string(),
                        key.to_string(),
                    );
                }
            }
            None => {}
        }
        bindings
    }

    /// Self link followed by every applicable transition from `state`.
    pub fn resolve(
        &self,
        state: &Arc<ResourceState>,
        entity: Option<&EntityPayload>,
        ctx: &RequestContext,
    ) -> Vec<Link> {
        let bindings = self.bindings(state, entity, ctx);
        let mut links: Vec<Link> = self.self_link(state, &bindings, ctx).into_iter().collect();
        for transition in self.graph.transitions_from(state) {
            if let Some(link) = self.link_for(&transition, &bindings, ctx) {
                links.push(link);
            }
        }
        links
    }

    pub fn resolve_entity(
        &self,
        state: &Arc<ResourceState>,
        resource: &mut EntityResource,
        ctx: &RequestContext,
    ) {
        resource.links = self.resolve(state, resource.entity.as_ref(), ctx);
    }

    /// Links for a collection and each of its members.
    ///
    /// The collection itself gets transitions that resolve from request
    /// bindings alone. Transitions that need member data are resolved per
    /// member; the one leading to the item state becomes the member's
    /// `self` link, followed by the item state's own transitions.
    pub fn resolve_collection(
        &self,
        state: &Arc<ResourceState>,
        resource: &mut CollectionResource,
        ctx: &RequestContext,
    ) {
        let outgoing = self.graph.transitions_from(state);
        let item_state = self.graph.item_state(state);
        let request_bindings = self.bindings(state, None, ctx);

        let mut links: Vec<Link> = self.self_link(state, &request_bindings, ctx).into_iter().collect();
        let mut per_item = Vec::new();
        for transition in outgoing {
            let is_item = item_state
                .as_ref()
                .is_some_and(|item| item.name == transition.target.name);
            match self.link_for(&transition, &request_bindings, ctx) {
                Some(link) if !is_item => links.push(link),
                _ => per_item.push(transition),
            }
        }
        resource.links = links;

        for member in &mut resource.entities {
            let member_state = item_state.as_ref().unwrap_or(state);
            let bindings = self.bindings(member_state, member.entity.as_ref(), ctx);
            let mut member_links = Vec::new();
            for transition in &per_item {
                let Some(mut link) = self.link_for(transition, &bindings, ctx) else {
                    continue;
                };
                let is_item = item_state
                    .as_ref()
                    .is_some_and(|item| item.name == transition.target.name);
                if is_item {
                    link.rel = SELF_REL.to_string();
                    member_links.insert(0, link);
                } else {
                    member_links.push(link);
                }
            }
            if let Some(item) = &item_state {
                for transition in self.graph.transitions_from(item) {
                    member_links.extend(self.link_for(&transition, &bindings, ctx));
                }
            }
            member.links = member_links;
        }
    }

    /// `None` when the state's own template cannot be filled.
    fn self_link(&self, state: &ResourceState, bindings: &Bindings, ctx: &RequestContext) -> Option<Link> {
        let Some(path) = state.path.fill(bindings) else {
            tracing::debug!(state = %state.name, template = %state.path, "Unresolved self template, self link omitted");
            return None;
        };
        let id = state.id();
        Some(Link {
            rel: SELF_REL.to_string(),
            href: ctx.absolute(&path),
            title: state.local_name.clone(),
            name: format!("{id}>{id}"),
            transition: None,
            target_variant: state.variant,
        })
    }

    fn link_for(
        &self,
        transition: &Arc<Transition>,
        bindings: &Bindings,
        ctx: &RequestContext,
    ) -> Option<Link> {
        if !transition.condition.evaluate(bindings) {
            tracing::trace!(transition = %transition.rel_name(), "Condition not met, link omitted");
            return None;
        }

        let filled = if transition.uri_parameters.is_empty() {
            transition.target.path.fill(bindings)
        } else {
            let mut values = bindings.clone();
            for (variable, property) in &transition.uri_parameters {
                if let Some(value) = bindings.get(property) {
                    values.insert(variable.clone(), value.clone());
                }
            }
            transition.target.path.fill(&values)
        };

        match filled {
            Some(path) => Some(Link::from_transition(transition, ctx.absolute(&path))),
            None => {
                tracing::trace!(
                    transition = %transition.rel_name(),
                    template = %transition.target.path,
                    "Unresolved template variable, link omitted"
                );
                None
            }
        }
    }
}
