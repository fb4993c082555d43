//! # REST Resources
//!
//! The per-request tree handed to codecs: an entity or a collection, its
//! final links, and any embedded sub-resources keyed by the transition
//! that reaches them.

use crate::entity::{Entity, TypedEntity};
use crate::error::{EngineError, EngineResult};
use crate::link::Link;
use crate::transition::TransitionId;
use std::collections::HashMap;

pub type Embedded = HashMap<TransitionId, RestResource>;

/// Entity data carried by a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityPayload {
    /// Generic property bag.
    Generic(Entity),
    /// Externally-typed entity with key and pre-fetched relations.
    Typed(TypedEntity),
}

impl EntityPayload {
    pub fn is_typed(&self) -> bool {
        matches!(self, EntityPayload::Typed(_))
    }
}

impl From<Entity> for EntityPayload {
    fn from(entity: Entity) -> Self {
        EntityPayload::Generic(entity)
    }
}

impl From<TypedEntity> for EntityPayload {
    fn from(entity: TypedEntity) -> Self {
        EntityPayload::Typed(entity)
    }
}

/// At most one entity plus its links and embeddings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityResource {
    pub entity_name: Option<String>,
    pub entity: Option<EntityPayload>,
    pub links: Vec<Link>,
    pub embedded: Embedded,
}

impl EntityResource {
    pub fn new(entity: impl Into<EntityPayload>) -> Self {
        let entity = entity.into();
        let entity_name = match &entity {
            EntityPayload::Generic(e) => Some(e.name.clone()),
            EntityPayload::Typed(_) => None,
        };
        Self {
            entity_name,
            entity: Some(entity),
            ..Default::default()
        }
    }

    /// The explicit "nothing was sent" result.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_entity_name(mut self, name: impl Into<String>) -> Self {
        self.entity_name = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entity.is_none()
    }

    pub fn typed(&self) -> Option<&TypedEntity> {
        match &self.entity {
            Some(EntityPayload::Typed(t)) => Some(t),
            _ => None,
        }
    }
}

/// A homogeneous sequence of entity resources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionResource {
    pub entity_name: Option<String>,
    pub entities: Vec<EntityResource>,
    pub links: Vec<Link>,
    pub embedded: Embedded,
    pub inline_count: Option<u64>,
}

impl CollectionResource {
    pub fn new(entity_name: impl Into<String>, entities: Vec<EntityResource>) -> Self {
        Self {
            entity_name: Some(entity_name.into()),
            entities,
            ..Default::default()
        }
    }

    pub fn with_inline_count(mut self, count: u64) -> Self {
        self.inline_count = Some(count);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestResource {
    Entity(EntityResource),
    Collection(CollectionResource),
}

/// Borrowed view of either resource kind.
#[derive(Debug, Clone, Copy)]
pub enum ResourceRef<'a> {
    Entity(&'a EntityResource),
    Collection(&'a CollectionResource),
}

impl<'a> ResourceRef<'a> {
    pub fn entity_name(&self) -> Option<&'a str> {
        match *self {
            ResourceRef::Entity(e) => e.entity_name.as_deref(),
            ResourceRef::Collection(c) => c.entity_name.as_deref(),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, ResourceRef::Collection(_))
    }
}

/// Discriminant the writers switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceShape {
    GenericEntity,
    TypedEntity,
    GenericCollection,
    TypedCollection,
}

impl RestResource {
    pub fn view(&self) -> ResourceRef<'_> {
        match self {
            RestResource::Entity(e) => ResourceRef::Entity(e),
            RestResource::Collection(c) => ResourceRef::Collection(c),
        }
    }

    pub fn links(&self) -> &[Link] {
        match self {
            RestResource::Entity(e) => &e.links,
            RestResource::Collection(c) => &c.links,
        }
    }

    pub fn links_mut(&mut self) -> &mut Vec<Link> {
        match self {
            RestResource::Entity(e) => &mut e.links,
            RestResource::Collection(c) => &mut c.links,
        }
    }

    pub fn embedded(&self) -> &Embedded {
        match self {
            RestResource::Entity(e) => &e.embedded,
            RestResource::Collection(c) => &c.embedded,
        }
    }

    pub fn entity_name(&self) -> Option<&str> {
        self.view().entity_name()
    }

    /// Classify for writing. Mixed collections, collections with empty
    /// members and nameless empty entities have no serialization path.
    pub fn shape(&self) -> EngineResult<ResourceShape> {
        match self {
            RestResource::Entity(e) => match &e.entity {
                Some(EntityPayload::Typed(_)) => Ok(ResourceShape::TypedEntity),
                Some(EntityPayload::Generic(_)) => Ok(ResourceShape::GenericEntity),
                None if e.entity_name.is_some() => Ok(ResourceShape::GenericEntity),
                None => Err(EngineError::UnsupportedResource(
                    "entity resource without entity or entity name".into(),
                )),
            },
            RestResource::Collection(c) => {
                let mut typed = None;
                for member in &c.entities {
                    let is_typed = match &member.entity {
                        Some(payload) => payload.is_typed(),
                        None => {
                            return Err(EngineError::UnsupportedResource(
                                "collection member without entity".into(),
                            ));
                        }
                    };
                    match typed {
                        None => typed = Some(is_typed),
                        Some(prev) if prev != is_typed => {
                            return Err(EngineError::UnsupportedResource(
                                "collection mixes generic and typed entities".into(),
                            ));
                        }
                        Some(_) => {}
                    }
                }
                Ok(if typed == Some(true) {
                    ResourceShape::TypedCollection
                } else {
                    ResourceShape::GenericCollection
                })
            }
        }
    }
}

impl From<EntityResource> for RestResource {
    fn from(resource: EntityResource) -> Self {
        RestResource::Entity(resource)
    }
}

impl From<CollectionResource> for RestResource {
    fn from(resource: CollectionResource) -> Self {
        RestResource::Collection(resource)
    }
}
