use crate::entity::PropertyValue;
use crate::state::{ResourceState, Variant};
use crate::template::PathParams;
use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Position of a transition in its graph; stable for the graph's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(pub(crate) usize);

/// Everything a condition may look at when deciding applicability.
pub type Bindings = PathParams;

/// Applicability predicate evaluated against the source entity's data.
#[derive(Clone, Default)]
pub enum Condition {
    #[default]
    Always,
    /// Property is present and not null.
    Present(String),
    /// Property renders to exactly this text.
    Equals(String, String),
    Not(Box<Condition>),
    All(Vec<Condition>),
    Custom(Arc<dyn Fn(&Bindings) -> bool + Send + Sync>),
}

impl Condition {
    pub fn custom(f: impl Fn(&Bindings) -> bool + Send + Sync + 'static) -> Self {
        Condition::Custom(Arc::new(f))
    }

    pub fn evaluate(&self, data: &Bindings) -> bool {
        match self {
            Condition::Always => true,
            Condition::Present(name) => data.get(name).is_some_and(|v| !v.is_empty()),
            Condition::Equals(name, expected) => data.get(name) == Some(expected),
            Condition::Not(inner) => !inner.evaluate(data),
            Condition::All(all) => all.iter().all(|c| c.evaluate(data)),
            Condition::Custom(f) => f(data),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => f.write_str("Always"),
            Condition::Present(name) => write!(f, "Present({name})"),
            Condition::Equals(name, value) => write!(f, "Equals({name}, {value})"),
            Condition::Not(inner) => write!(f, "Not({inner:?})"),
            Condition::All(all) => f.debug_tuple("All").field(all).finish(),
            Condition::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Declarative form of [`Condition`] used by graph documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionSpec {
    Present { property: String },
    Equals { property: String, value: PropertyValue },
    Absent { property: String },
}

impl From<ConditionSpec> for Condition {
    fn from(spec: ConditionSpec) -> Self {
        match spec {
            ConditionSpec::Present { property } => Condition::Present(property),
            ConditionSpec::Equals { property, value } => Condition::Equals(property, value.to_string()),
            ConditionSpec::Absent { property } => Condition::Not(Box::new(Condition::Present(property))),
        }
    }
}

/// A directed, conditionally applicable edge between two states.
#[derive(Debug, Clone)]
pub struct Transition {
    pub id: TransitionId,
    pub source: Arc<ResourceState>,
    pub target: Arc<ResourceState>,
    pub method: Method,
    /// Link relation override; `rel_name()` otherwise.
    pub rel: Option<String>,
    pub label: Option<String>,
    pub condition: Condition,
    /// Template variables filled from named entity properties instead of
    /// the same-named property, e.g. `handle -> twitterHandle`.
    pub uri_parameters: Vec<(String, String)>,
}

impl Transition {
    /// `"{source}>{target}"` using state display identities.
    pub fn rel_name(&self) -> String {
        format!("{}>{}", self.source, self.target)
    }

    pub fn link_rel(&self) -> String {
        self.rel.clone().unwrap_or_else(|| self.rel_name())
    }

    pub fn title(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.target.local_name)
    }

    pub fn target_variant(&self) -> Variant {
        self.target.variant
    }
}

impl PartialEq for Transition {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Transition {}
