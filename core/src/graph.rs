//! # StateGraph - Immutable Resource-State Registry
//!
//! Built once through [`StateGraphBuilder`], then shared read-only (`Arc`)
//! across request handlers. Nothing is mutated after [`StateGraphBuilder::build`].
//!
//! ## Resolution rules
//!
//! - `state(name)` is an exact lookup; unknown names are `None`.
//! - `resolve(method, path)` strips the base URI, then walks states in
//!   registration order. The first state whose template matches the path
//!   *and* accepts the method wins. If templates match but no candidate
//!   accepts the method the result is `MethodNotAllowed`. If no template
//!   matches the result is `None`.

use crate::error::{EngineError, EngineResult};
use crate::state::{ResourceState, Variant};
use crate::template::normalize;
use crate::transition::{Condition, Transition, TransitionId};
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;

/// Read access to declared states, as consumed by codecs and adapters.
pub trait ResourceStateProvider: Send + Sync {
    fn resource_state(&self, name: &str) -> Option<Arc<ResourceState>>;

    fn resolve_state(&self, method: &Method, path: &str) -> EngineResult<Option<Arc<ResourceState>>>;
}

#[derive(Debug)]
pub struct StateGraph {
    states: Vec<Arc<ResourceState>>,
    by_name: HashMap<String, usize>,
    transitions: Vec<Arc<Transition>>,
    outgoing: HashMap<String, Vec<TransitionId>>,
    base_uri: String,
    service_document: Option<String>,
}

impl StateGraph {
    pub fn builder() -> StateGraphBuilder {
        StateGraphBuilder::new()
    }

    pub fn state(&self, name: &str) -> Option<Arc<ResourceState>> {
        self.by_name.get(name).map(|&i| self.states[i].clone())
    }

    pub fn states(&self) -> impl Iterator<Item = &Arc<ResourceState>> {
        self.states.iter()
    }

    pub fn transition(&self, id: TransitionId) -> Option<&Arc<Transition>> {
        self.transitions.get(id.0)
    }

    /// Transitions leaving `state`, in declaration order.
    pub fn transitions_from(&self, state: &ResourceState) -> Vec<Arc<Transition>> {
        self.outgoing
            .get(&state.name)
            .map(|ids| ids.iter().map(|id| self.transitions[id.0].clone()).collect())
            .unwrap_or_default()
    }

    pub fn service_document(&self) -> Option<Arc<ResourceState>> {
        self.service_document.as_deref().and_then(|name| self.state(name))
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Methods accepted by `state`: those of the transitions targeting it,
    /// plus `GET` on the service document.
    pub fn allowed_methods(&self, state: &ResourceState) -> Vec<Method> {
        let mut methods = Vec::new();
        if self.service_document.as_deref() == Some(state.name.as_str()) {
            methods.push(Method::GET);
        }
        for transition in &self.transitions {
            if transition.target.name == state.name && !methods.contains(&transition.method) {
                methods.push(transition.method.clone());
            }
        }
        methods
    }

    /// The singular state items of `collection` link to, if one is declared.
    pub fn item_state(&self, collection: &ResourceState) -> Option<Arc<ResourceState>> {
        self.transitions_from(collection)
            .into_iter()
            .map(|t| t.target.clone())
            .find(|target| {
                target.variant == Variant::Singular && target.entity_name == collection.entity_name
            })
    }

    pub fn resolve(&self, method: &Method, path: &str) -> EngineResult<Option<Arc<ResourceState>>> {
        let path = self.strip_base(path);
        let candidates: Vec<&Arc<ResourceState>> =
            self.states.iter().filter(|s| s.path.matches(&path)).collect();

        let Some(first) = candidates.first() else {
            tracing::debug!(%path, "No state matches path");
            return Ok(None);
        };

        let mut declared = Vec::new();
        for candidate in &candidates {
            let allowed = self.allowed_methods(candidate);
            if allowed.contains(method) {
                tracing::trace!(%path, %method, state = %candidate.name, "Resolved state");
                return Ok(Some((*candidate).clone()));
            }
            for m in allowed {
                if !declared.contains(&m) {
                    declared.push(m);
                }
            }
        }

        tracing::debug!(%path, %method, state = %first.name, "Method not allowed");
        Err(EngineError::method_not_allowed(
            first.name.clone(),
            method.clone(),
            declared,
        ))
    }

    /// Leading separator, base URI removed. An absolute base contributes
    /// only its path component.
    pub fn strip_base(&self, path: &str) -> String {
        let path = normalize(path);
        let base = normalize(base_path(&self.base_uri));
        if base == "/" {
            return path;
        }
        match path.strip_prefix(&base) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => normalize(rest),
            _ => path,
        }
    }
}

fn base_path(uri: &str) -> &str {
    match uri.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => uri,
    }
}

impl ResourceStateProvider for StateGraph {
    fn resource_state(&self, name: &str) -> Option<Arc<ResourceState>> {
        self.state(name)
    }

    fn resolve_state(&self, method: &Method, path: &str) -> EngineResult<Option<Arc<ResourceState>>> {
        self.resolve(method, path)
    }
}

/// Declaration of one transition, resolved against states at build time.
#[derive(Debug, Clone)]
pub struct TransitionDecl {
    pub source: String,
    pub target: String,
    pub method: Method,
    pub rel: Option<String>,
    pub label: Option<String>,
    pub condition: Condition,
    pub uri_parameters: Vec<(String, String)>,
}

impl TransitionDecl {
    pub fn new(source: impl Into<String>, target: impl Into<String>, method: Method) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            method,
            rel: None,
            label: None,
            condition: Condition::Always,
            uri_parameters: Vec::new(),
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn rel(mut self, rel: impl Into<String>) -> Self {
        self.rel = Some(rel.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn uri_parameter(mut self, variable: impl Into<String>, property: impl Into<String>) -> Self {
        self.uri_parameters.push((variable.into(), property.into()));
        self
    }
}

#[derive(Debug, Default)]
pub struct StateGraphBuilder {
    states: Vec<ResourceState>,
    transitions: Vec<TransitionDecl>,
    base_uri: String,
    service_document: Option<String>,
}

impl StateGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    pub fn service_document(mut self, name: impl Into<String>) -> Self {
        self.service_document = Some(name.into());
        self
    }

    pub fn state(mut self, state: ResourceState) -> Self {
        self.states.push(state);
        self
    }

    pub fn transition(mut self, decl: TransitionDecl) -> Self {
        self.transitions.push(decl);
        self
    }

    pub fn build(self) -> EngineResult<StateGraph> {
        let mut by_name = HashMap::with_capacity(self.states.len());
        let mut states = Vec::with_capacity(self.states.len());
        for state in self.states {
            if by_name.insert(state.name.clone(), states.len()).is_some() {
                return Err(EngineError::Config(format!("duplicate state name '{}'", state.name)));
            }
            states.push(Arc::new(state));
        }

        let lookup = |name: &str| -> EngineResult<Arc<ResourceState>> {
            by_name
                .get(name)
                .map(|&i| states[i].clone())
                .ok_or_else(|| EngineError::Config(format!("transition references unknown state '{name}'")))
        };

        let mut transitions = Vec::with_capacity(self.transitions.len());
        let mut outgoing: HashMap<String, Vec<TransitionId>> = HashMap::new();
        for decl in self.transitions {
            let id = TransitionId(transitions.len());
            let source = lookup(&decl.source)?;
            let target = lookup(&decl.target)?;
            outgoing.entry(source.name.clone()).or_default().push(id);
            transitions.push(Arc::new(Transition {
                id,
                source,
                target,
                method: decl.method,
                rel: decl.rel,
                label: decl.label,
                condition: decl.condition,
                uri_parameters: decl.uri_parameters,
            }));
        }

        if let Some(name) = &self.service_document {
            if !by_name.contains_key(name) {
                return Err(EngineError::Config(format!("service document '{name}' is not a declared state")));
            }
        }

        tracing::debug!(
            states = states.len(),
            transitions = transitions.len(),
            "State graph built"
        );

        Ok(StateGraph {
            states,
            by_name,
            transitions,
            outgoing,
            base_uri: self.base_uri,
            service_document: self.service_document,
        })
    }
}
