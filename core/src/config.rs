//! # Configuration
//!
//! [`EngineConfig`] holds engine-wide settings. [`GraphDocument`] is a
//! declarative TOML description of states, transitions and catalog
//! entries from which a [`StateGraph`] and an [`InMemoryCatalog`] are built.
//!
//! ```toml
//! [engine]
//! base_uri = "http://localhost:8080/example/api"
//! model_name = "Northwind"
//!
//! [[states]]
//! name = "customer"
//! entity = "Customer"
//! path = "/Customers({id})"
//!
//! [[transitions]]
//! source = "ServiceDocument"
//! target = "customer"
//! method = "GET"
//! condition = { kind = "present", property = "CustomerID" }
//! ```

use crate::embed::DEFAULT_MAX_EMBED_DEPTH;
use crate::error::{EngineError, EngineResult};
use crate::graph::{StateGraph, TransitionDecl};
use crate::metadata::{EntityType, InMemoryCatalog};
use crate::resolver::DEFAULT_ID_PATH_ELEMENT;
use crate::state::{ResourceState, Variant};
use crate::transition::ConditionSpec;
use http::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Absolute base of every href, e.g. `http://localhost:8080/api`.
    pub base_uri: String,
    pub service_document: String,
    /// Key variable for states that do not name one.
    pub default_id_path_element: String,
    pub max_embed_depth: usize,
    pub model_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_uri: "http://localhost:8080".to_string(),
            service_document: "ServiceDocument".to_string(),
            default_id_path_element: DEFAULT_ID_PATH_ELEMENT.to_string(),
            max_embed_depth: DEFAULT_MAX_EMBED_DEPTH,
            model_name: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDecl {
    pub name: String,
    #[serde(default)]
    pub entity: String,
    pub path: String,
    #[serde(default)]
    pub local_name: Option<String>,
    #[serde(default)]
    pub variant: Variant,
    #[serde(default)]
    pub path_id_parameter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub source: String,
    pub target: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub rel: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub condition: Option<ConditionSpec>,
    /// Template variable -> entity property.
    #[serde(default)]
    pub uri_parameters: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub states: Vec<StateDecl>,
    #[serde(default)]
    pub transitions: Vec<TransitionEntry>,
    #[serde(default)]
    pub entity_types: Vec<EntityType>,
}

impl GraphDocument {
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "Loading graph document");
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn build_graph(&self) -> EngineResult<StateGraph> {
        let mut builder = StateGraph::builder()
            .base_uri(self.engine.base_uri.clone())
            .service_document(self.engine.service_document.clone());

        for decl in &self.states {
            let mut state =
                ResourceState::new(decl.name.clone(), decl.entity.clone(), &decl.path).with_variant(decl.variant);
            if let Some(local_name) = &decl.local_name {
                state = state.with_local_name(local_name.clone());
            }
            if let Some(parameter) = &decl.path_id_parameter {
                state = state.with_path_id_parameter(parameter.clone());
            }
            builder = builder.state(state);
        }

        for entry in &self.transitions {
            let method = Method::from_bytes(entry.method.to_ascii_uppercase().as_bytes())
                .map_err(|_| EngineError::Config(format!("invalid method '{}'", entry.method)))?;
            let mut decl = TransitionDecl::new(entry.source.clone(), entry.target.clone(), method);
            if let Some(rel) = &entry.rel {
                decl = decl.rel(rel.clone());
            }
            if let Some(label) = &entry.label {
                decl = decl.label(label.clone());
            }
            if let Some(condition) = &entry.condition {
                decl = decl.when(condition.clone().into());
            }
            for (variable, property) in &entry.uri_parameters {
                decl = decl.uri_parameter(variable.clone(), property.clone());
            }
            builder = builder.transition(decl);
        }

        builder.build()
    }

    pub fn build_catalog(&self) -> InMemoryCatalog {
        self.entity_types
            .iter()
            .cloned()
            .fold(InMemoryCatalog::new(self.engine.model_name.clone()), |catalog, t| {
                catalog.with_type(t)
            })
    }
}
