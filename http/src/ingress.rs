//! # Ingress Module - Flat API Entry Point
//!
//! `NavigationIngress` wires HTTP requests to the hypermedia engine:
//!
//! - `bind(addr)` sets the listen address
//! - `handler(state, fn)` supplies entity data for one resource state
//! - `run()` serves with hyper
//! - `into_service()` returns a tower `Service` for existing stacks
//!
//! A request is resolved to a state, its body (if any) is decoded by the
//! Atom codec, the state's handler produces entity data, and the engine
//! renders links and embeddings before the codec writes the response.
//! States without a handler answer with their links only.

use crate::response::HttpResponse;
use crate::service::{Navigator, NavigationService};
use http::Request;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpListener;
use waypoint_atom::AtomCodec;
use waypoint_core::{
    EngineResult, EntityPayload, EntityResource, GraphDocument, HypermediaEngine, RequestContext, ResourceState,
};

/// What a state handler is given.
#[derive(Debug, Clone)]
pub struct StateRequest {
    pub state: Arc<ResourceState>,
    pub ctx: RequestContext,
    /// Decoded request body; empty for bodiless requests.
    pub body: EntityResource,
}

/// What a state handler returns.
#[derive(Debug, Clone)]
pub enum Reply {
    Entity(EntityPayload),
    Collection {
        entities: Vec<EntityPayload>,
        inline_count: Option<u64>,
    },
    NoContent,
}

impl Reply {
    pub fn entity(entity: impl Into<EntityPayload>) -> Self {
        Reply::Entity(entity.into())
    }

    pub fn collection<E: Into<EntityPayload>>(entities: impl IntoIterator<Item = E>) -> Self {
        Reply::Collection {
            entities: entities.into_iter().map(Into::into).collect(),
            inline_count: None,
        }
    }
}

pub(crate) type StateHandler =
    Arc<dyn Fn(StateRequest) -> Pin<Box<dyn Future<Output = EngineResult<Reply>> + Send>> + Send + Sync>;

pub struct NavigationIngress {
    addr: Option<String>,
    engine: HypermediaEngine,
    codec: AtomCodec,
    handlers: HashMap<String, StateHandler>,
}

impl NavigationIngress {
    pub fn new(engine: HypermediaEngine, codec: AtomCodec) -> Self {
        Self {
            addr: None,
            engine,
            codec,
            handlers: HashMap::new(),
        }
    }

    /// Build engine and codec from a graph document.
    pub fn from_document(doc: &GraphDocument) -> EngineResult<Self> {
        let graph = Arc::new(doc.build_graph()?);
        let catalog = Arc::new(doc.build_catalog());
        let engine = HypermediaEngine::new(graph.clone(), doc.engine.clone());
        let codec = AtomCodec::new(graph, catalog, doc.engine.clone());
        Ok(Self::new(engine, codec))
    }

    /// Set the bind address for the server.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Register the data handler for the state named `state`.
    pub fn handler<F, Fut>(mut self, state: impl Into<String>, handler: F) -> Self
    where
        F: Fn(StateRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EngineResult<Reply>> + Send + 'static,
    {
        let handler: StateHandler = Arc::new(move |request| Box::pin(handler(request)));
        self.handlers.insert(state.into(), handler);
        self
    }

    pub fn into_service(self) -> NavigationService {
        NavigationService::new(Arc::new(Navigator {
            engine: self.engine,
            codec: self.codec,
            handlers: self.handlers,
        }))
    }

    /// Serve until the listener fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr_str = self.addr.clone().unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let addr: SocketAddr = addr_str.parse()?;
        let service = self.into_service();

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Waypoint HTTP Ingress listening on http://{}", addr);

        loop {
            let (stream, _) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let service = service.clone();

            tokio::task::spawn(async move {
                let hyper_service = service_fn(move |req: Request<Incoming>| {
                    let service = service.clone();
                    async move { Ok::<HttpResponse, Infallible>(serve_incoming(&service, req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, hyper_service).await {
                    tracing::error!("Error serving connection: {:?}", err);
                }
            });
        }
    }
}

async fn serve_incoming(service: &NavigationService, req: Request<Incoming>) -> HttpResponse {
    let (parts, body) = req.into_parts();
    match body.collect().await {
        Ok(collected) => service.handle(Request::from_parts(parts, collected.to_bytes())).await,
        Err(err) => {
            tracing::warn!(%err, "Failed to read request body");
            crate::response::text_response(http::StatusCode::BAD_REQUEST, "Unreadable request body")
        }
    }
}
