//! # AtomCodec - Atom/OData Wire Codec
//!
//! `write` turns a finished resource tree into an Atom entry or feed.
//! `read` resolves the addressed state for an inbound request, extracts
//! its key from the path and rebuilds a typed entity from the body.

use crate::interceptor::ODataLinkInterceptor;
use crate::media::{self, APPLICATION_ATOM_XML};
use crate::parser::parse_entry;
use crate::probe::{Pushback, is_empty_buffered};
use crate::writer::AtomWriter;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderValue};
use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{BufRead, Read};
use std::sync::Arc;
use waypoint_core::template::{extract_path, split};
use waypoint_core::{
    EngineConfig, EngineError, EngineResult, EntityCatalog, EntityKey, EntityResource, LinkInterceptorChain,
    RequestContext, ResourceShape, ResourceState, RestResource, StateGraph, TypedEntity,
};

/// A key segment holding a single quoted string key, `('...')`.
static STRING_KEY_RESOURCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\('.*'\)").expect("valid regex"));

/// Serialized document plus the response metadata that goes with it.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDocument {
    pub content_type: &'static str,
    pub body: Bytes,
}

impl EncodedDocument {
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(self.content_length()));
    }
}

pub struct AtomCodec {
    graph: Arc<StateGraph>,
    catalog: Arc<dyn EntityCatalog>,
    config: EngineConfig,
    chain: LinkInterceptorChain,
}

impl AtomCodec {
    /// Codec with the OData link interceptor installed.
    pub fn new(graph: Arc<StateGraph>, catalog: Arc<dyn EntityCatalog>, config: EngineConfig) -> Self {
        let chain = LinkInterceptorChain::new().with(ODataLinkInterceptor::new(&graph));
        Self {
            graph,
            catalog,
            config,
            chain,
        }
    }

    pub fn with_chain(mut self, chain: LinkInterceptorChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn accepts(&self, media_type: &str) -> bool {
        media::is_supported(media_type)
    }

    pub fn write(&self, resource: &RestResource, ctx: &RequestContext) -> EngineResult<EncodedDocument> {
        let shape = resource.shape().inspect_err(|err| {
            tracing::error!(%err, "Resource shape has no Atom serialization");
        })?;

        let mut resource = resource.clone();
        self.chain.process(&mut resource, ctx);

        let base = ctx.service_base(self.graph.service_document().as_deref());
        let writer = AtomWriter::new(&base, self.catalog.as_ref());
        let body = match (&resource, shape) {
            (RestResource::Entity(entity), ResourceShape::GenericEntity | ResourceShape::TypedEntity) => {
                writer.entry_document(entity)?
            }
            (RestResource::Collection(feed), ResourceShape::GenericCollection | ResourceShape::TypedCollection) => {
                writer.feed_document(feed)?
            }
            (_, shape) => {
                let err = EngineError::UnsupportedResource(format!("{shape:?}"));
                tracing::error!(%err, "Resource shape has no Atom serialization");
                return Err(err);
            }
        };

        tracing::debug!(?shape, bytes = body.len(), "Atom document written");
        Ok(EncodedDocument {
            content_type: APPLICATION_ATOM_XML,
            body: Bytes::from(body),
        })
    }

    /// Read from a plain stream; emptiness is probed with a one-byte push-back.
    pub fn read<R: Read>(&self, body: R, method: &Method, path: &str) -> EngineResult<EntityResource> {
        let target = self.target(method, path)?;
        let mut body = Pushback::new(body);
        if body.is_empty()? {
            tracing::debug!(%path, "Empty request body");
            return Ok(EntityResource::empty());
        }
        let mut text = String::new();
        body.read_to_string(&mut text)
            .map_err(|e| EngineError::Malformed(format!("request body: {e}")))?;
        target.into_resource(&text)
    }

    /// Read from a buffered stream; emptiness is probed by peeking.
    pub fn read_buffered<R: BufRead>(&self, mut body: R, method: &Method, path: &str) -> EngineResult<EntityResource> {
        let target = self.target(method, path)?;
        if is_empty_buffered(&mut body)? {
            tracing::debug!(%path, "Empty request body");
            return Ok(EntityResource::empty());
        }
        let mut text = String::new();
        body.read_to_string(&mut text)
            .map_err(|e| EngineError::Malformed(format!("request body: {e}")))?;
        target.into_resource(&text)
    }

    fn target(&self, method: &Method, path: &str) -> EngineResult<ReadTarget> {
        let state = self
            .graph
            .resolve(method, path)?
            .ok_or_else(|| EngineError::IllegalState(format!("no resource state for {method} {path}")))?;
        let entity_name = state
            .entity_name
            .clone()
            .ok_or_else(|| EngineError::IllegalState(format!("state '{}' has no entity name", state.name)))?;

        let key = self.key(&state, path)?;
        let entity_set = self.catalog.entity_set_for(&state)?;
        tracing::trace!(state = %state.name, %entity_set, ?key, "Read target resolved");
        Ok(ReadTarget {
            entity_name,
            entity_set,
            key,
        })
    }

    fn key(&self, state: &ResourceState, path: &str) -> EngineResult<Option<EntityKey>> {
        let id_parameter = state.path_id_parameter_or(&self.config.default_id_path_element);
        let relative = self.graph.strip_base(path);
        let params = extract_path(&relative, &state.path)?;
        let Some(raw) = params.get(id_parameter).filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        // The grammar probe looks only at the segment carrying the key.
        let key_segment = state
            .path
            .segments()
            .iter()
            .position(|s| s.variable_name() == Some(id_parameter))
            .and_then(|i| split(&relative).nth(i))
            .unwrap_or(relative.as_str());
        let key = if STRING_KEY_RESOURCE.is_match(key_segment) {
            EntityKey::parse_quoted(raw)
        } else {
            EntityKey::parse(raw)?
        };
        Ok(Some(key))
    }
}

struct ReadTarget {
    entity_name: String,
    entity_set: String,
    key: Option<EntityKey>,
}

impl ReadTarget {
    fn into_resource(self, body: &str) -> EngineResult<EntityResource> {
        let properties = parse_entry(body)?;
        let entity = TypedEntity {
            entity_set: self.entity_set,
            key: self.key,
            properties,
            relations: Vec::new(),
        };
        Ok(EntityResource::new(entity).with_entity_name(self.entity_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use waypoint_core::{
        CollectionResource, Entity, EntityType, HypermediaEngine, InMemoryCatalog, KeyValue, Link, LinkInterceptor,
        PropertyValue, Relation, ResourceRef, TransitionDecl,
    };

    const BASE: &str = "http://localhost:8080/example/api";

    fn graph() -> Arc<StateGraph> {
        Arc::new(
            StateGraph::builder()
                .base_uri(BASE)
                .service_document("ServiceDocument")
                .state(ResourceState::new("ServiceDocument", "", "/"))
                .state(ResourceState::collection("customers", "Customer", "/Customers"))
                .state(ResourceState::new("customer", "Customer", "/Customers({id})"))
                .state(ResourceState::new("updateCustomer", "Customer", "/Customers({id})"))
                .state(ResourceState::collection("customerOrders", "Order", "/Customers({id})/Orders"))
                .state(ResourceState::new("order", "Order", "/Orders({id})"))
                .state(ResourceState::new("orderLine", "OrderLine", "/OrderLines({id})"))
                .state(ResourceState::new("home", "", "/home"))
                .transition(TransitionDecl::new("ServiceDocument", "customers", Method::GET))
                .transition(TransitionDecl::new("ServiceDocument", "home", Method::PUT))
                .transition(TransitionDecl::new("customers", "customer", Method::GET))
                .transition(TransitionDecl::new("customer", "updateCustomer", Method::PUT))
                .transition(TransitionDecl::new("customer", "customerOrders", Method::GET).label("Orders"))
                .transition(TransitionDecl::new("customerOrders", "order", Method::GET))
                .transition(TransitionDecl::new("order", "orderLine", Method::PUT))
                .build()
                .unwrap(),
        )
    }

    fn codec() -> (Arc<StateGraph>, AtomCodec) {
        let graph = graph();
        let catalog = InMemoryCatalog::new("Northwind")
            .with_type(EntityType::new("Customer", "Customers").with_key("CustomerID"))
            .with_type(EntityType::new("Order", "Orders").with_key("OrderID"));
        let config = EngineConfig {
            base_uri: BASE.into(),
            ..Default::default()
        };
        (graph.clone(), AtomCodec::new(graph, Arc::new(catalog), config))
    }

    fn engine(graph: &Arc<StateGraph>) -> HypermediaEngine {
        let config = EngineConfig {
            base_uri: BASE.into(),
            ..Default::default()
        };
        HypermediaEngine::new(graph.clone(), config)
    }

    fn xml(doc: &EncodedDocument) -> String {
        String::from_utf8(doc.body.to_vec()).unwrap()
    }

    /// Only `Read`, so the codec must push back the probed byte.
    struct Unbuffered(Cursor<Vec<u8>>);

    impl Read for Unbuffered {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.0.read(buf)
        }
    }

    const CUSTOMER_ENTRY: &str = r#"<entry xmlns="http://www.w3.org/2005/Atom" xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices" xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata"><content type="application/xml"><m:properties><d:CustomerID>ALFKI</d:CustomerID><d:Rating m:type="Edm.Int32">4</d:Rating></m:properties></content></entry>"#;

    #[test]
    fn test_read_empty_body_is_empty_result() {
        let (_, codec) = codec();
        let path = "/example/api/Customers('ALFKI')";
        let read = codec.read(Cursor::new(Vec::new()), &Method::PUT, path).unwrap();
        assert!(read.is_empty());
        assert!(read.typed().is_none());

        let read = codec.read_buffered(Cursor::new(Vec::new()), &Method::PUT, path).unwrap();
        assert!(read.is_empty());
    }

    #[test]
    fn test_read_unbuffered_body_is_fully_recovered() {
        let (_, codec) = codec();
        let body = Unbuffered(Cursor::new(CUSTOMER_ENTRY.as_bytes().to_vec()));
        let read = codec
            .read(body, &Method::PUT, "/example/api/Customers('ALFKI')")
            .unwrap();
        let entity = read.typed().unwrap();
        assert_eq!(entity.entity_set, "Customers");
        assert_eq!(entity.key, Some(EntityKey::single("ALFKI")));
        // The probed first byte is part of the parsed document.
        assert_eq!(entity.properties["Rating"], PropertyValue::Int64(4));
        assert_eq!(read.entity_name.as_deref(), Some("Customer"));
    }

    #[test]
    fn test_read_key_grammars() {
        let (_, codec) = codec();
        let quoted = codec
            .read_buffered(Cursor::new(CUSTOMER_ENTRY), &Method::PUT, "/example/api/Customers('a=1,b')")
            .unwrap();
        assert_eq!(quoted.typed().unwrap().key, Some(EntityKey::single("a=1,b")));

        let structured = codec
            .read_buffered(Cursor::new(CUSTOMER_ENTRY), &Method::PUT, "/example/api/Customers(42)")
            .unwrap();
        assert_eq!(
            structured.typed().unwrap().key,
            Some(EntityKey::Single(KeyValue::Int64(42)))
        );

        let bad = codec.read_buffered(Cursor::new(CUSTOMER_ENTRY), &Method::PUT, "/example/api/Customers(x=)");
        assert!(matches!(bad, Err(EngineError::KeyParse { .. })));
    }

    #[test]
    fn test_read_key_grammar_follows_key_segment() {
        let graph = Arc::new(
            StateGraph::builder()
                .base_uri(BASE)
                .service_document("ServiceDocument")
                .state(ResourceState::new("ServiceDocument", "", "/"))
                .state(ResourceState::new("customerOrder", "Order", "/Customers({customer})/Orders({id})"))
                .transition(TransitionDecl::new("ServiceDocument", "customerOrder", Method::PUT))
                .build()
                .unwrap(),
        );
        let config = EngineConfig {
            base_uri: BASE.into(),
            ..Default::default()
        };
        let codec = AtomCodec::new(graph, Arc::new(InMemoryCatalog::new("Northwind")), config);

        let numeric = codec
            .read_buffered(Cursor::new(CUSTOMER_ENTRY), &Method::PUT, "/example/api/Customers('x')/Orders(1)")
            .unwrap();
        assert_eq!(numeric.typed().unwrap().key, Some(EntityKey::Single(KeyValue::Int64(1))));

        let quoted = codec
            .read_buffered(Cursor::new(CUSTOMER_ENTRY), &Method::PUT, "/example/api/Customers(7)/Orders('a')")
            .unwrap();
        assert_eq!(quoted.typed().unwrap().key, Some(EntityKey::single("a")));
    }

    #[test]
    fn test_read_truncated_body_is_malformed() {
        let (_, codec) = codec();
        let err = codec
            .read_buffered(
                Cursor::new("<entry><content><m:properties><d:CustomerID>ALFKI</d:CustomerID>"),
                &Method::PUT,
                "/example/api/Customers('ALFKI')",
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Malformed(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_read_faults() {
        let (_, codec) = codec();
        let err = codec
            .read_buffered(Cursor::new(""), &Method::DELETE, "/example/api/Customers('ALFKI')")
            .unwrap_err();
        assert_eq!(err.allow_header().as_deref(), Some("GET, PUT, HEAD, OPTIONS"));

        let err = codec
            .read_buffered(Cursor::new(""), &Method::GET, "/example/api/Nowhere/at/all")
            .unwrap_err();
        assert!(matches!(err, EngineError::IllegalState(_)));

        // Resolves, but the state carries no entity.
        let err = codec
            .read_buffered(Cursor::new(""), &Method::PUT, "/example/api/home")
            .unwrap_err();
        assert!(matches!(err, EngineError::IllegalState(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_read_entity_set_falls_back_to_state_name() {
        let (_, codec) = codec();
        let read = codec
            .read_buffered(Cursor::new(CUSTOMER_ENTRY), &Method::PUT, "/example/api/OrderLines(1)")
            .unwrap();
        assert_eq!(read.typed().unwrap().entity_set, "orderLine");
    }

    #[test]
    fn test_write_inline_and_deferred_links() {
        let (graph, codec) = codec();
        let engine = engine(&graph);
        let route = engine
            .route(&Method::GET, "/example/api/Customers('ALFKI')")
            .unwrap()
            .unwrap();
        let orders = vec![TypedEntity::new("Orders", Some(EntityKey::single(10643i64))).with_property("OrderID", 10643i64)];
        let customer = TypedEntity::new("Customers", Some(EntityKey::single("ALFKI")))
            .with_property("CustomerID", "ALFKI")
            .with_relation(Relation::many("Orders", orders));

        let resource = engine.render_entity(&route.state, customer, &route.ctx);
        let doc = codec.write(&resource, &route.ctx).unwrap();
        let text = xml(&doc);

        assert_eq!(doc.content_type, "application/atom+xml");
        assert_eq!(doc.content_length(), doc.body.len());
        assert!(text.contains(r#"xml:base="http://localhost:8080/example/api/""#));
        assert!(text.contains(r#"<link rel="self" title="customer" href="Customers(&apos;ALFKI&apos;)"/>"#));
        assert!(text.contains(
            r#"<link rel="http://schemas.microsoft.com/ado/2007/08/dataservices/related/Orders" type="application/atom+xml;type=feed" title="Orders" href="Customers(&apos;ALFKI&apos;)/Orders"><m:inline><feed>"#
        ));
        assert!(text.contains(r#"<d:OrderID m:type="Edm.Int64">10643</d:OrderID>"#));
        assert!(text.contains(r#"<category term="NorthwindModel.Customer""#));
        // The PUT transition has no embedding, so it stays deferred.
        assert!(text.contains(r#"type="application/atom+xml;type=entry" title="updateCustomer""#));
    }

    #[test]
    fn test_write_feed_with_count() {
        let (graph, codec) = codec();
        let engine = engine(&graph);
        let route = engine.route(&Method::GET, "/example/api/Customers").unwrap().unwrap();
        let members = vec![
            TypedEntity::new("Customers", Some(EntityKey::single("ALFKI"))).into(),
            TypedEntity::new("Customers", Some(EntityKey::single("ANATR"))).into(),
        ];
        let RestResource::Collection(feed) = engine.render_collection(&route.state, members, &route.ctx) else {
            panic!("expected collection");
        };
        let feed = RestResource::from(feed.with_inline_count(2));

        let text = xml(&codec.write(&feed, &route.ctx).unwrap());
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<feed xml:base="));
        assert!(text.contains("<title type=\"text\">Customers</title>"));
        assert!(text.contains("<m:count>2</m:count>"));
        assert_eq!(text.matches("<entry>").count(), 2);
        assert!(text.contains("<id>http://localhost:8080/example/api/Customers(&apos;ANATR&apos;)</id>"));
    }

    #[test]
    fn test_write_unsupported_shape() {
        let (_, codec) = codec();
        let ctx = RequestContext::new(BASE, Method::GET, "/Customers");
        let mixed = RestResource::from(CollectionResource::new(
            "Customer",
            vec![
                EntityResource::new(TypedEntity::new("Customers", None)),
                EntityResource::new(Entity::new("Customer")),
            ],
        ));
        assert!(matches!(
            codec.write(&mixed, &ctx),
            Err(EngineError::UnsupportedResource(_))
        ));
    }

    #[test]
    fn test_custom_chain_suppresses_link() {
        struct DropPut;

        impl LinkInterceptor for DropPut {
            fn intercept(&self, _: ResourceRef<'_>, link: Link, _: &RequestContext) -> Option<Link> {
                let is_put = link.transition.as_ref().is_some_and(|t| t.method == Method::PUT);
                (!is_put).then_some(link)
            }
        }

        let (graph, codec) = codec();
        let codec = codec.with_chain(
            LinkInterceptorChain::new()
                .with(DropPut)
                .with(ODataLinkInterceptor::new(&graph)),
        );
        let engine = engine(&graph);
        let route = engine
            .route(&Method::GET, "/example/api/Customers('ALFKI')")
            .unwrap()
            .unwrap();
        let customer = TypedEntity::new("Customers", Some(EntityKey::single("ALFKI")));
        let text = xml(&codec.write(&engine.render_entity(&route.state, customer, &route.ctx), &route.ctx).unwrap());

        assert!(!text.contains("updateCustomer"));
        assert!(text.contains("title=\"Orders\""));
        assert!(codec.accepts("application/atom+xml;type=entry"));
        assert!(!codec.accepts("text/html"));
    }
}
