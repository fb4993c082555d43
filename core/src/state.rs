use crate::template::PathTemplate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a state addresses one entity or a collection of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Singular,
    Collection,
}

/// A named application state bound to a path template and an entity.
///
/// `name` is the identity within a graph. The display form is
/// `"{entity_name}.{local_name}"`, which is how transitions name their ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState {
    pub name: String,
    pub local_name: String,
    pub entity_name: Option<String>,
    pub path: PathTemplate,
    /// Variable carrying the primary key; the engine default applies if unset.
    pub path_id_parameter: Option<String>,
    pub variant: Variant,
}

impl ResourceState {
    pub fn new(name: impl Into<String>, entity_name: impl Into<String>, path: &str) -> Self {
        let name = name.into();
        let entity_name: String = entity_name.into();
        Self {
            local_name: name.clone(),
            name,
            entity_name: (!entity_name.is_empty()).then_some(entity_name),
            path: PathTemplate::parse(path),
            path_id_parameter: None,
            variant: Variant::Singular,
        }
    }

    pub fn collection(name: impl Into<String>, entity_name: impl Into<String>, path: &str) -> Self {
        Self::new(name, entity_name, path).with_variant(Variant::Collection)
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_local_name(mut self, local_name: impl Into<String>) -> Self {
        self.local_name = local_name.into();
        self
    }

    pub fn with_path_id_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.path_id_parameter = Some(parameter.into());
        self
    }

    pub fn is_collection(&self) -> bool {
        self.variant == Variant::Collection
    }

    /// `entity.local` identity used for link names.
    pub fn id(&self) -> String {
        self.to_string()
    }

    /// Key variable for this state, falling back to `default`.
    pub fn path_id_parameter_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.path_id_parameter.as_deref().unwrap_or(default)
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}",
            self.entity_name.as_deref().unwrap_or_default(),
            self.local_name
        )
    }
}
