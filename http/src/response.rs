//! Mapping of engine outcomes to HTTP responses.

use bytes::Bytes;
use http::header::{ALLOW, CONTENT_TYPE, HeaderValue};
use http::{Response, StatusCode};
use http_body_util::Full;
use waypoint_atom::EncodedDocument;
use waypoint_core::EngineError;

pub type HttpResponse = Response<Full<Bytes>>;

pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> HttpResponse {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

pub fn not_found() -> HttpResponse {
    text_response(StatusCode::NOT_FOUND, "Not Found")
}

pub fn no_content() -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

pub fn document_response(status: StatusCode, document: EncodedDocument) -> HttpResponse {
    let mut response = Response::new(Full::new(document.body.clone()));
    *response.status_mut() = status;
    document.apply_headers(response.headers_mut());
    response
}

/// 405 with `Allow` for method faults, 400 for malformed requests, 500
/// for everything the caller cannot fix.
pub fn fault_response(err: &EngineError) -> HttpResponse {
    match err {
        EngineError::MethodNotAllowed { .. } => {
            let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, err.to_string());
            if let Some(allow) = err.allow_header().and_then(|v| HeaderValue::from_str(&v).ok()) {
                response.headers_mut().insert(ALLOW, allow);
            }
            response
        }
        err if err.is_client_error() => text_response(StatusCode::BAD_REQUEST, err.to_string()),
        err => {
            tracing::error!(%err, "Request failed");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_fault_statuses() {
        let err = EngineError::method_not_allowed("customer", Method::DELETE, [Method::GET]);
        let response = fault_response(&err);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, HEAD, OPTIONS");

        let bad = fault_response(&EngineError::IllegalState("no entity".into()));
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let fatal = fault_response(&EngineError::UnsupportedResource("mixed".into()));
        assert_eq!(fatal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(not_found().status(), StatusCode::NOT_FOUND);
    }
}
