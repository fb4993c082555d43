//! # waypoint-core
//!
//! Wire-format-agnostic hypermedia engine: a resource-state graph, link
//! resolution, link interception and embedding expansion. Wire codecs and
//! HTTP adapters build on top of this crate.

pub mod config;
pub mod context;
pub mod embed;
pub mod engine;
pub mod entity;
pub mod error;
pub mod graph;
pub mod interceptor;
pub mod key;
pub mod link;
pub mod metadata;
pub mod resolver;
pub mod resource;
pub mod state;
pub mod telemetry;
pub mod template;
pub mod transition;

pub use config::{EngineConfig, GraphDocument};
pub use context::RequestContext;
pub use embed::EmbeddingExpander;
pub use engine::{HypermediaEngine, Route};
pub use entity::{Entity, EntityProperties, PropertyValue, Related, Relation, TypedEntity};
pub use error::{EngineError, EngineResult};
pub use graph::{ResourceStateProvider, StateGraph, StateGraphBuilder, TransitionDecl};
pub use interceptor::{IdentityInterceptor, LinkInterceptor, LinkInterceptorChain};
pub use key::{EntityKey, KeyValue};
pub use link::Link;
pub use metadata::{EntityCatalog, EntityType, InMemoryCatalog};
pub use resolver::LinkResolver;
pub use resource::{
    CollectionResource, EntityPayload, EntityResource, ResourceRef, ResourceShape, RestResource,
};
pub use state::{ResourceState, Variant};
pub use template::{PathParams, PathTemplate};
pub use transition::{Condition, ConditionSpec, Transition, TransitionId};
