//! # NavigationService - Tower Service Adapter
//!
//! Adapts the hypermedia engine to Tower's `Service` trait, so a
//! navigation graph can be mounted in any Tower-compatible stack.

use crate::ingress::{Reply, StateHandler, StateRequest};
use crate::response::{HttpResponse, document_response, fault_response, no_content, not_found, text_response};
use bytes::Bytes;
use http::header::{ACCEPT, ALLOW, HeaderValue};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::Instrument;
use waypoint_atom::AtomCodec;
use waypoint_atom::media::essence;
use waypoint_core::{EngineError, EngineResult, EntityResource, HypermediaEngine, RestResource, Route};

pub(crate) struct Navigator {
    pub(crate) engine: HypermediaEngine,
    pub(crate) codec: AtomCodec,
    pub(crate) handlers: HashMap<String, StateHandler>,
}

/// Cloneable handle over the engine, codec and state handlers.
#[derive(Clone)]
pub struct NavigationService {
    inner: Arc<Navigator>,
}

impl NavigationService {
    pub(crate) fn new(inner: Arc<Navigator>) -> Self {
        Self { inner }
    }

    pub fn engine(&self) -> &HypermediaEngine {
        &self.inner.engine
    }

    /// Serve one request whose body has already been collected.
    pub async fn handle(&self, req: Request<Bytes>) -> HttpResponse {
        let span = tracing::info_span!(
            "HTTPRequest",
            waypoint.http.method = %req.method(),
            waypoint.http.path = %req.uri().path(),
            waypoint.http.request_id = %uuid::Uuid::new_v4(),
        );
        async move {
            let response = self.dispatch(req).await;
            tracing::info!(status = response.status().as_u16(), "Request finished");
            response
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, req: Request<Bytes>) -> HttpResponse {
        if !self.acceptable(&req) {
            return text_response(StatusCode::NOT_ACCEPTABLE, "Not Acceptable");
        }

        let method = req.method().clone();
        let path = req.uri().path().to_string();
        if method == Method::OPTIONS {
            return self.options(&path);
        }

        // HEAD is served as GET with the body dropped.
        let routed = if method == Method::HEAD { Method::GET } else { method.clone() };
        let route = match self.inner.engine.route(&routed, &path) {
            Ok(Some(route)) => route,
            Ok(None) => return not_found(),
            Err(err) => return fault_response(&err),
        };

        let mut response = match self.respond(route, &routed, &path, req.into_body()).await {
            Ok(response) => response,
            Err(err) => fault_response(&err),
        };
        if method == Method::HEAD {
            *response.body_mut() = http_body_util::Full::new(Bytes::new());
        }
        response
    }

    async fn respond(&self, route: Route, method: &Method, path: &str, body: Bytes) -> EngineResult<HttpResponse> {
        let Route { state, ctx } = route;
        let body = if has_body(method) {
            self.inner.codec.read_buffered(&body[..], method, path)?
        } else {
            EntityResource::empty()
        };

        let engine = &self.inner.engine;
        let resource: RestResource = match self.inner.handlers.get(&state.name) {
            Some(handler) => {
                let request = StateRequest {
                    state: state.clone(),
                    ctx: ctx.clone(),
                    body,
                };
                match handler(request).await? {
                    Reply::Entity(entity) => engine.render_entity(&state, entity, &ctx),
                    Reply::Collection { entities, inline_count } => {
                        let mut resource = engine.render_collection(&state, entities, &ctx);
                        if let (RestResource::Collection(feed), Some(count)) = (&mut resource, inline_count) {
                            feed.inline_count = Some(count);
                        }
                        resource
                    }
                    Reply::NoContent => return Ok(no_content()),
                }
            }
            None => {
                tracing::debug!(state = %state.name, "No handler registered, rendering links only");
                engine.render_state(&state, &ctx)
            }
        };

        let document = self.inner.codec.write(&resource, &ctx)?;
        Ok(document_response(StatusCode::OK, document))
    }

    /// `Allow` lists every method declared for states matching the path.
    fn options(&self, path: &str) -> HttpResponse {
        let graph = self.inner.engine.graph();
        let relative = graph.strip_base(path);
        let matching: Vec<_> = graph.states().filter(|s| s.path.matches(&relative)).collect();
        if matching.is_empty() {
            return not_found();
        }
        let declared = matching.into_iter().flat_map(|s| graph.allowed_methods(s));
        let fault = EngineError::method_not_allowed("", Method::OPTIONS, declared);
        let mut response = no_content();
        if let Some(allow) = fault.allow_header().and_then(|v| HeaderValue::from_str(&v).ok()) {
            response.headers_mut().insert(ALLOW, allow);
        }
        response
    }

    fn acceptable(&self, req: &Request<Bytes>) -> bool {
        let Some(accept) = req.headers().get(ACCEPT).and_then(|v| v.to_str().ok()) else {
            return true;
        };
        accept.split(',').any(|media| {
            let media = essence(media);
            media.is_empty() || media == "*/*" || media == "application/*" || self.inner.codec.accepts(&media)
        })
    }
}

fn has_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

impl<B> Service<Request<B>> for NavigationService
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: std::fmt::Display + Send,
{
    type Response = HttpResponse;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(err) => {
                    tracing::warn!(%err, "Failed to read request body");
                    return Ok(text_response(StatusCode::BAD_REQUEST, "Unreadable request body"));
                }
            };
            Ok(service.handle(Request::from_parts(parts, bytes)).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingress::NavigationIngress;
    use http::header::CONTENT_TYPE;
    use http_body_util::Full;
    use tower::ServiceExt;
    use waypoint_core::{Entity, EntityPayload, GraphDocument, PropertyValue};

    const DOC: &str = r#"
[engine]
base_uri = "http://localhost:8080/api"

[[states]]
name = "ServiceDocument"
path = "/"

[[states]]
name = "users"
entity = "User"
path = "/users"
variant = "collection"

[[states]]
name = "user"
entity = "User"
path = "/users/{id}"

[[states]]
name = "archive"
entity = "User"
path = "/users/{id}/archive"

[[transitions]]
source = "ServiceDocument"
target = "users"

[[transitions]]
source = "users"
target = "user"
uri_parameters = { id = "id" }

[[transitions]]
source = "user"
target = "user"
method = "PUT"
uri_parameters = { id = "id" }

[[transitions]]
source = "user"
target = "archive"
method = "POST"
uri_parameters = { id = "id" }
"#;

    fn user(id: i64, name: &str) -> Entity {
        Entity::new("User").with_property("id", id).with_property("name", name)
    }

    fn service() -> NavigationService {
        let doc = GraphDocument::from_toml_str(DOC).unwrap();
        NavigationIngress::from_document(&doc)
            .unwrap()
            .handler("users", |_req| async { Ok(Reply::collection([user(1, "ada"), user(2, "bob")])) })
            .handler("user", |req: StateRequest| async move {
                let id = req.ctx.path_params.get("id").cloned().unwrap_or_default();
                if req.ctx.method == Method::PUT {
                    let Some(EntityPayload::Typed(sent)) = req.body.entity else {
                        return Err(EngineError::IllegalState("missing body".into()));
                    };
                    return match sent.properties.get("name") {
                        Some(PropertyValue::String(name)) if name == "ada" => Ok(Reply::NoContent),
                        _ => Err(EngineError::IllegalState("unexpected body".into())),
                    };
                }
                let id: i64 = id.parse().map_err(|_| EngineError::IllegalState(format!("bad id '{id}'")))?;
                Ok(Reply::entity(user(id, "ada")))
            })
            .into_service()
    }

    fn get(path: &str) -> Request<Bytes> {
        Request::builder().uri(path).body(Bytes::new()).unwrap()
    }

    async fn body_text(response: HttpResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_get_entry_renders_atom_with_links() {
        let response = service().handle(get("/api/users/1")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("application/atom+xml"));

        let xml = body_text(response).await;
        assert!(xml.contains("<entry"));
        assert!(xml.contains("ada"));
        assert!(xml.contains("users/1/archive"));
    }

    #[tokio::test]
    async fn test_get_collection_and_service_document() {
        let service = service();
        let feed = body_text(service.handle(get("/api/users")).await).await;
        assert!(feed.contains("<feed"));
        assert_eq!(feed.matches("<entry").count(), 2);

        let root = service.handle(get("/api/")).await;
        assert_eq!(root.status(), StatusCode::OK);
        assert!(body_text(root).await.contains("users"));
    }

    #[tokio::test]
    async fn test_unknown_path_and_method() {
        let service = service();
        assert_eq!(service.handle(get("/api/orders")).await.status(), StatusCode::NOT_FOUND);

        let delete = Request::builder()
            .method(Method::DELETE)
            .uri("/api/users/1")
            .body(Bytes::new())
            .unwrap();
        let response = service.handle(delete).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, PUT, HEAD, OPTIONS");
    }

    #[tokio::test]
    async fn test_put_decodes_atom_body() {
        let entry = r#"<entry xmlns="http://www.w3.org/2005/Atom"
  xmlns:d="http://schemas.microsoft.com/ado/2007/08/dataservices"
  xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
  <content type="application/xml"><m:properties><d:name>ada</d:name></m:properties></content>
</entry>"#;
        let put = Request::builder()
            .method(Method::PUT)
            .uri("/api/users/1")
            .header(CONTENT_TYPE, "application/atom+xml")
            .body(Bytes::from(entry))
            .unwrap();
        assert_eq!(service().handle(put).await.status(), StatusCode::NO_CONTENT);

        let malformed = Request::builder()
            .method(Method::PUT)
            .uri("/api/users/1")
            .body(Bytes::from("<entry><content><m:properties>"))
            .unwrap();
        assert_eq!(service().handle(malformed).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_accept_head_and_options() {
        let service = service();
        let json = Request::builder()
            .uri("/api/users/1")
            .header(ACCEPT, "application/json")
            .body(Bytes::new())
            .unwrap();
        assert_eq!(service.handle(json).await.status(), StatusCode::NOT_ACCEPTABLE);

        let head = Request::builder()
            .method(Method::HEAD)
            .uri("/api/users/1")
            .body(Bytes::new())
            .unwrap();
        let response = service.handle(head).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.is_empty());

        let options = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/users/1")
            .body(Bytes::new())
            .unwrap();
        let response = service.handle(options).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ALLOW], "GET, PUT, HEAD, OPTIONS");
    }

    #[tokio::test]
    async fn test_tower_service_collects_body() {
        let request = Request::builder()
            .uri("/api/users/2")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = service().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
