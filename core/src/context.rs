use crate::state::ResourceState;
use crate::template::{PathParams, PathTemplate, extract, split};
use http::Method;

/// Per-request addressing context, passed explicitly through link
/// resolution, interception and encoding.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Absolute base of the application, e.g. `http://localhost:8080/api`.
    pub base_uri: String,
    pub method: Method,
    /// Request path relative to `base_uri`, leading `/`.
    pub path: String,
    /// Parameters already bound from the request path.
    pub path_params: PathParams,
}

impl RequestContext {
    pub fn new(base_uri: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        let path: String = path.into();
        Self {
            base_uri: base_uri.into().trim_end_matches('/').to_string(),
            method,
            path: crate::template::normalize(&path),
            path_params: PathParams::new(),
        }
    }

    pub fn with_path_params(mut self, params: PathParams) -> Self {
        self.path_params = params;
        self
    }

    /// Absolute href for a path filled from a template.
    pub fn absolute(&self, path: &str) -> String {
        if path == "/" {
            return format!("{}/", self.base_uri);
        }
        format!("{}{}", self.base_uri, path)
    }

    /// The service document's URI, used as the base for relative hrefs.
    ///
    /// Variables in the service document's template are filled from the
    /// leading segments of the request path; the result ends with `/`.
    pub fn service_base(&self, service_document: Option<&ResourceState>) -> String {
        let Some(doc) = service_document else {
            return format!("{}/", self.base_uri);
        };
        let templated = templated_path(&doc.path, &self.path);
        let mut base = format!("{}{}", self.base_uri, templated);
        if !base.ends_with('/') {
            base.push('/');
        }
        base
    }

    /// `href` relative to the service base; foreign hrefs are unchanged.
    pub fn relativize(&self, href: &str, service_document: Option<&ResourceState>) -> String {
        crate::link::relativize(href, &self.service_base(service_document))
    }
}

fn templated_path(template: &PathTemplate, request_path: &str) -> String {
    let wanted = template.segments().len();
    let actual: Vec<&str> = split(request_path).take(wanted).collect();
    match extract(&actual, template.segments()) {
        Ok(params) => template.fill_partial(&params),
        Err(_) => template.as_str().to_string(),
    }
}
