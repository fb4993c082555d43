use http::Method;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Faults raised by the hypermedia engine.
///
/// Lookups that have a meaningful "absent" branch (unknown state name, path
/// that matches no template) are `Option`s, not variants here.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Method {method} not allowed for state '{state}' (allowed: {})", allow_header(.allowed))]
    MethodNotAllowed {
        state: String,
        method: Method,
        allowed: Vec<Method>,
    },

    #[error("Path template mismatch: {actual} segment(s) against {expected} template segment(s)")]
    TemplateMismatch { actual: usize, expected: usize },

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Unsupported resource shape for writing: {0}")]
    UnsupportedResource(String),

    #[error("Malformed entity key '{raw}': {reason}")]
    KeyParse { raw: String, reason: String },

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Build a `MethodNotAllowed` fault. `HEAD` and `OPTIONS` are appended to
    /// the declared methods exactly once each.
    pub fn method_not_allowed(
        state: impl Into<String>,
        method: Method,
        declared: impl IntoIterator<Item = Method>,
    ) -> Self {
        let mut allowed: Vec<Method> = Vec::new();
        for m in declared
            .into_iter()
            .chain([Method::HEAD, Method::OPTIONS])
        {
            if !allowed.contains(&m) {
                allowed.push(m);
            }
        }
        EngineError::MethodNotAllowed {
            state: state.into(),
            method,
            allowed,
        }
    }

    /// Value for an HTTP `Allow` header, if this is a method fault.
    pub fn allow_header(&self) -> Option<String> {
        match self {
            EngineError::MethodNotAllowed { allowed, .. } => Some(allow_header(allowed)),
            _ => None,
        }
    }

    /// Whether the caller should answer with a client error (400 equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::TemplateMismatch { .. }
                | EngineError::IllegalState(_)
                | EngineError::KeyParse { .. }
                | EngineError::Malformed(_)
        )
    }
}

fn allow_header(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
