//! # EmbeddingExpander - Inline Pre-Fetched Relations
//!
//! A typed entity may arrive from the data layer with related entities
//! already joined. For each relation the expander computes the path it
//! lives at (`{owner path}/{relation title}`) and looks for a link of the
//! owner whose service-relative href is that path. A match becomes an
//! embedding keyed by the link's transition; the embedded resource gets
//! its own links resolved and is expanded in turn.
//!
//! Relations without a matching link are dropped. Recursion stops at
//! `max_depth`, and an entity already embedded once in the same expansion
//! is not embedded again, so its link stays deferred.

use crate::context::RequestContext;
use crate::entity::{Related, TypedEntity};
use crate::link::{Link, SELF_REL, relativize};
use crate::resolver::LinkResolver;
use crate::resource::{CollectionResource, EntityResource, RestResource};
use crate::state::ResourceState;
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_MAX_EMBED_DEPTH: usize = 8;

#[derive(Debug, Clone)]
pub struct EmbeddingExpander {
    resolver: LinkResolver,
    max_depth: usize,
}

struct Expansion<'a> {
    ctx: &'a RequestContext,
    base: String,
    visited: HashSet<String>,
}

impl EmbeddingExpander {
    pub fn new(resolver: LinkResolver) -> Self {
        Self {
            resolver,
            max_depth: DEFAULT_MAX_EMBED_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Expand the resource, or every member of a collection.
    pub fn expand(&self, resource: &mut RestResource, ctx: &RequestContext) {
        let mut run = self.start(ctx);
        match resource {
            RestResource::Entity(entity) => self.expand_entity_at(entity, &mut run, 0),
            RestResource::Collection(collection) => {
                for member in &mut collection.entities {
                    self.expand_entity_at(member, &mut run, 0);
                }
            }
        }
    }

    pub fn expand_entity(&self, resource: &mut EntityResource, ctx: &RequestContext) {
        let mut run = self.start(ctx);
        self.expand_entity_at(resource, &mut run, 0);
    }

    fn start<'a>(&self, ctx: &'a RequestContext) -> Expansion<'a> {
        let service_document = self.resolver.graph().service_document();
        Expansion {
            ctx,
            base: ctx.service_base(service_document.as_deref()),
            visited: HashSet::new(),
        }
    }

    fn expand_entity_at(&self, resource: &mut EntityResource, run: &mut Expansion<'_>, depth: usize) {
        let Some(owner) = resource.typed() else {
            return;
        };
        if owner.relations.is_empty() {
            return;
        }
        if depth >= self.max_depth {
            tracing::debug!(entity = %owner.rel_id(), depth, "Embedding depth limit reached");
            return;
        }
        run.visited.insert(owner.rel_id());

        let owner_path = owner_path(owner, &resource.links, &run.base);
        let relations = owner.relations.clone();
        for relation in relations {
            let path = format!("{owner_path}/{}", relation.title);
            let matched = resource.links.iter().find(|link| {
                link.transition.is_some() && relativize(&link.href, &run.base) == path
            });
            let Some(link) = matched else {
                tracing::debug!(relation = %relation.title, %path, "No link for pre-fetched relation, dropped");
                continue;
            };
            let Some(transition) = link.transition.clone() else {
                continue;
            };
            let href = link.href.clone();

            let embedded = match relation.related {
                Related::Single(entity) => {
                    if run.visited.contains(&entity.rel_id()) {
                        tracing::trace!(entity = %entity.rel_id(), "Already embedded, link stays deferred");
                        continue;
                    }
                    run.visited.insert(entity.rel_id());
                    let mut child = self.entity_resource(&transition.target, *entity, run.ctx);
                    self.expand_entity_at(&mut child, run, depth + 1);
                    RestResource::Entity(child)
                }
                Related::Many(entities) => {
                    let collection = self.collection_resource(&transition.target, href, entities, run, depth);
                    RestResource::Collection(collection)
                }
            };
            resource.embedded.insert(transition.id, embedded);
        }
    }

    fn entity_resource(
        &self,
        state: &Arc<ResourceState>,
        entity: TypedEntity,
        ctx: &RequestContext,
    ) -> EntityResource {
        let mut resource = EntityResource::new(entity);
        resource.entity_name = state.entity_name.clone();
        self.resolver.resolve_entity(state, &mut resource, ctx);
        resource
    }

    fn collection_resource(
        &self,
        target: &Arc<ResourceState>,
        href: String,
        entities: Vec<TypedEntity>,
        run: &mut Expansion<'_>,
        depth: usize,
    ) -> CollectionResource {
        let graph = self.resolver.graph().clone();
        let item_state = graph.item_state(target).unwrap_or_else(|| target.clone());
        let entity_name = target.entity_name.clone().unwrap_or_default();

        let mut members = Vec::with_capacity(entities.len());
        for entity in entities {
            let revisit = !run.visited.insert(entity.rel_id());
            let mut member = self.entity_resource(&item_state, entity, run.ctx);
            if !revisit {
                self.expand_entity_at(&mut member, run, depth + 1);
            }
            members.push(member);
        }

        let mut collection = CollectionResource::new(entity_name, members);
        collection.links = vec![self_link_for(target, href)];
        collection
    }
}

/// Path of `owner` relative to the service base: its self link when that
/// is service-relative, else `EntitySet(key)`.
fn owner_path(owner: &TypedEntity, links: &[Link], base: &str) -> String {
    links
        .iter()
        .find(|link| link.is_self())
        .map(|link| relativize(&link.href, base))
        .filter(|path| !path.is_empty() && !path.contains("://"))
        .unwrap_or_else(|| owner.rel_id())
}

fn self_link_for(state: &ResourceState, href: String) -> Link {
    let id = state.id();
    Link {
        rel: SELF_REL.to_string(),
        href,
        title: state.local_name.clone(),
        name: format!("{id}>{id}"),
        transition: None,
        target_variant: state.variant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Relation;
    use crate::graph::{StateGraph, TransitionDecl};
    use crate::key::EntityKey;
    use http::Method;

    fn northwind() -> Arc<StateGraph> {
        Arc::new(
            StateGraph::builder()
                .service_document("ServiceDocument")
                .state(ResourceState::new("ServiceDocument", "", "/"))
                .state(ResourceState::new("customer", "Customer", "/Customers({id})"))
                .state(ResourceState::collection("customerOrders", "Order", "/Customers({id})/Orders"))
                .state(ResourceState::new("customerInfo", "Info", "/Customers({id})/Info"))
                .state(ResourceState::new("customerContact", "Info", "/Customers({id})/Contact"))
                .state(ResourceState::new("order", "Order", "/Orders({id})"))
                .state(ResourceState::new("orderCustomer", "Customer", "/Orders({id})/Customer"))
                .transition(TransitionDecl::new("customer", "customerOrders", Method::GET).label("Orders"))
                .transition(TransitionDecl::new("customer", "customerInfo", Method::GET).label("Info"))
                .transition(TransitionDecl::new("customer", "customerContact", Method::GET).label("Contact"))
                .transition(TransitionDecl::new("customerOrders", "order", Method::GET))
                .transition(TransitionDecl::new("order", "orderCustomer", Method::GET).label("Customer"))
                .build()
                .unwrap(),
        )
    }

    fn customer(id: &str) -> TypedEntity {
        TypedEntity::new("Customers", Some(EntityKey::single(id))).with_property("CustomerID", id)
    }

    fn order(id: i64) -> TypedEntity {
        TypedEntity::new("Orders", Some(EntityKey::single(id))).with_property("OrderID", id)
    }

    fn prepare(graph: &Arc<StateGraph>, entity: TypedEntity) -> (EmbeddingExpander, EntityResource, RequestContext) {
        let ctx = RequestContext::new("http://localhost/api", Method::GET, "/Customers('ALFKI')");
        let resolver = LinkResolver::new(graph.clone());
        let mut resource = EntityResource::new(entity);
        resolver.resolve_entity(&graph.state("customer").unwrap(), &mut resource, &ctx);
        (EmbeddingExpander::new(resolver), resource, ctx)
    }

    #[test]
    fn test_one_matching_relation_embeds_once() {
        let graph = northwind();
        let info = TypedEntity::new("Infos", Some(EntityKey::single(1i64)));
        let (expander, mut resource, ctx) =
            prepare(&graph, customer("ALFKI").with_relation(Relation::single("Info", info)));

        expander.expand_entity(&mut resource, &ctx);
        assert_eq!(resource.embedded.len(), 1);
        let info_link = resource.links.iter().find(|l| l.title == "Info").unwrap();
        assert!(resource.embedded.contains_key(&info_link.transition_id().unwrap()));
    }

    #[test]
    fn test_shared_leaf_embeds_once() {
        let graph = northwind();
        let info = || TypedEntity::new("Infos", Some(EntityKey::single(1i64)));
        let entity = customer("ALFKI")
            .with_relation(Relation::single("Info", info()))
            .with_relation(Relation::single("Contact", info()));
        let (expander, mut resource, ctx) = prepare(&graph, entity);

        expander.expand_entity(&mut resource, &ctx);
        assert_eq!(resource.embedded.len(), 1);
        let info_link = resource.links.iter().find(|l| l.title == "Info").unwrap();
        assert!(resource.embedded.contains_key(&info_link.transition_id().unwrap()));
        // The second relation keeps its link, unembedded.
        let contact_link = resource.links.iter().find(|l| l.title == "Contact").unwrap();
        assert!(!resource.embedded.contains_key(&contact_link.transition_id().unwrap()));
    }

    #[test]
    fn test_unmatched_relation_is_dropped() {
        let graph = northwind();
        let other = TypedEntity::new("Suppliers", Some(EntityKey::single(1i64)));
        let (expander, mut resource, ctx) =
            prepare(&graph, customer("ALFKI").with_relation(Relation::single("Supplier", other)));

        expander.expand_entity(&mut resource, &ctx);
        assert!(resource.embedded.is_empty());
    }

    #[test]
    fn test_collection_relation_recurses_and_stops_on_revisit() {
        let graph = northwind();
        // ALFKI -> Orders [10643 -> Customer ALFKI]: the back-reference is not re-embedded.
        let orders = vec![order(10643).with_relation(Relation::single("Customer", customer("ALFKI")))];
        let (expander, mut resource, ctx) =
            prepare(&graph, customer("ALFKI").with_relation(Relation::many("Orders", orders)));

        expander.expand_entity(&mut resource, &ctx);
        assert_eq!(resource.embedded.len(), 1);
        let RestResource::Collection(feed) = resource.embedded.values().next().unwrap() else {
            panic!("expected embedded collection");
        };
        assert_eq!(feed.entities.len(), 1);
        let member = &feed.entities[0];
        assert_eq!(member.links[0].href, "http://localhost/api/Orders(10643)");
        assert!(member.links.iter().any(|l| l.title == "Customer"));
        assert!(member.embedded.is_empty());
        assert_eq!(feed.links[0].href, "http://localhost/api/Customers('ALFKI')/Orders");
    }

    #[test]
    fn test_depth_limit() {
        let graph = northwind();
        let info = TypedEntity::new("Infos", Some(EntityKey::single(1i64)));
        let (expander, mut resource, ctx) =
            prepare(&graph, customer("ALFKI").with_relation(Relation::single("Info", info)));

        expander.with_max_depth(0).expand_entity(&mut resource, &ctx);
        assert!(resource.embedded.is_empty());
    }
}
