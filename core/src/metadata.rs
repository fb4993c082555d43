//! Entity-type catalog consulted for wire addressing.

use crate::error::{EngineError, EngineResult};
use crate::state::ResourceState;
use serde::{Deserialize, Serialize};

/// Appended to the model name to form the type namespace, `NorthwindModel`.
pub const MODEL_SUFFIX: &str = "Model";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    /// Bare type name, e.g. `Customer`.
    pub name: String,
    /// Set the type's instances are addressed through, e.g. `Customers`.
    pub entity_set: String,
    #[serde(default)]
    pub keys: Vec<String>,
}

impl EntityType {
    pub fn new(name: impl Into<String>, entity_set: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_set: entity_set.into(),
            keys: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.keys.push(key.into());
        self
    }
}

pub trait EntityCatalog: Send + Sync {
    fn model_name(&self) -> &str;

    /// Lookup by fully-qualified name, `{model}Model.{type}`.
    fn find_entity_type(&self, qualified_name: &str) -> Option<&EntityType>;

    /// Lookup of an entity set by its own name or its type's bare name.
    fn find_entity_set(&self, name: &str) -> Option<&EntityType>;

    fn qualified_name(&self, entity_name: &str) -> String {
        format!("{}{}.{}", self.model_name(), MODEL_SUFFIX, entity_name)
    }

    /// Wire entity-set name for `state`: qualified type lookup, then a
    /// direct entity-name lookup, then the state's own name.
    fn entity_set_for(&self, state: &ResourceState) -> EngineResult<String> {
        let entity_name = state.entity_name.as_deref().ok_or_else(|| {
            EngineError::IllegalState(format!("state '{}' has no entity name", state.name))
        })?;
        if let Some(found) = self.find_entity_type(&self.qualified_name(entity_name)) {
            return Ok(found.entity_set.clone());
        }
        if let Some(found) = self.find_entity_set(entity_name) {
            return Ok(found.entity_set.clone());
        }
        tracing::debug!(state = %state.name, entity = entity_name, "No catalog entry, using state name");
        Ok(state.name.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    model_name: String,
    types: Vec<EntityType>,
}

impl InMemoryCatalog {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            types: Vec::new(),
        }
    }

    pub fn with_type(mut self, entity_type: EntityType) -> Self {
        self.types.push(entity_type);
        self
    }

    pub fn types(&self) -> &[EntityType] {
        &self.types
    }
}

impl EntityCatalog for InMemoryCatalog {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn find_entity_type(&self, qualified_name: &str) -> Option<&EntityType> {
        let (namespace, name) = qualified_name.rsplit_once('.')?;
        let model = namespace.strip_suffix(MODEL_SUFFIX)?;
        if model != self.model_name {
            return None;
        }
        self.types.iter().find(|t| t.name == name)
    }

    fn find_entity_set(&self, name: &str) -> Option<&EntityType> {
        self.types
            .iter()
            .find(|t| t.entity_set == name)
            .or_else(|| self.types.iter().find(|t| t.name == name))
    }
}
