//! # Path Templates
//!
//! A path template is a `/`-delimited pattern such as `/customers/{id}` or
//! `/Customers({id})/Orders`. The same template drives both directions:
//! routing (match + [`extract`]) and href construction ([`PathTemplate::fill`]).

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Bound path parameters, name -> raw (undecoded) segment value.
pub type PathParams = HashMap<String, String>;

/// One `/`-delimited piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// `{name}` with optional literal text around it, e.g. `Customers({id})`.
    Variable {
        prefix: String,
        name: String,
        suffix: String,
    },
}

impl Segment {
    pub fn parse(raw: &str) -> Self {
        if let (Some(open), Some(close)) = (raw.find('{'), raw.rfind('}')) {
            if open < close {
                return Segment::Variable {
                    prefix: raw[..open].to_string(),
                    name: raw[open + 1..close].to_string(),
                    suffix: raw[close + 1..].to_string(),
                };
            }
        }
        Segment::Literal(raw.to_string())
    }

    pub fn variable_name(&self) -> Option<&str> {
        match self {
            Segment::Variable { name, .. } => Some(name),
            Segment::Literal(_) => None,
        }
    }

    /// Structural match: literals exactly, variables any non-empty value.
    pub fn matches(&self, actual: &str) -> bool {
        self.capture(actual).is_some()
    }

    fn capture<'a>(&self, actual: &'a str) -> Option<&'a str> {
        match self {
            Segment::Literal(lit) => (lit == actual).then_some(actual),
            Segment::Variable { prefix, suffix, .. } => {
                let rest = actual.strip_prefix(prefix.as_str())?;
                let value = rest.strip_suffix(suffix.as_str())?;
                (!value.is_empty()).then_some(value)
            }
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal(lit) => f.write_str(lit),
            Segment::Variable {
                prefix,
                name,
                suffix,
            } => write!(f, "{prefix}{{{name}}}{suffix}"),
        }
    }
}

/// An ordered sequence of literal and variable segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = normalize(&raw.into());
        let segments = split(&raw).map(Segment::parse).collect();
        Self { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::variable_name)
    }

    /// Segment counts equal and every segment matches structurally.
    pub fn matches(&self, path: &str) -> bool {
        let actual: Vec<&str> = split(path).collect();
        actual.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(&actual)
                .all(|(seg, value)| seg.matches(value))
    }

    /// Substitute variables from `values`. Returns `None` when any variable
    /// has no (or an empty) value.
    pub fn fill(&self, values: &PathParams) -> Option<String> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Variable {
                    prefix,
                    name,
                    suffix,
                } => {
                    let value = values.get(name).filter(|v| !v.is_empty())?;
                    out.push_str(prefix);
                    out.push_str(value);
                    out.push_str(suffix);
                }
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        Some(out)
    }

    /// Like [`fill`](Self::fill) but leaves unresolved variables in place.
    pub fn fill_partial(&self, values: &PathParams) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Variable {
                    prefix,
                    name,
                    suffix,
                } if values.get(name).is_some_and(|v| !v.is_empty()) => {
                    out.push_str(prefix);
                    out.push_str(&values[name]);
                    out.push_str(suffix);
                }
                other => out.push_str(&other.to_string()),
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }
}

impl From<PathTemplate> for String {
    fn from(template: PathTemplate) -> Self {
        template.raw
    }
}

impl From<String> for PathTemplate {
    fn from(raw: String) -> Self {
        PathTemplate::parse(raw)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Bind every variable segment of `template` to the matching actual segment.
///
/// Fails with `TemplateMismatch` when the segment counts differ. Literal
/// segments are not checked here; callers match structurally first.
pub fn extract(actual: &[&str], template: &[Segment]) -> EngineResult<PathParams> {
    if actual.len() != template.len() {
        return Err(EngineError::TemplateMismatch {
            actual: actual.len(),
            expected: template.len(),
        });
    }
    let mut params = PathParams::new();
    for (segment, value) in template.iter().zip(actual) {
        if let Segment::Variable { name, .. } = segment {
            let bound = segment.capture(value).unwrap_or(value);
            params.insert(name.clone(), bound.to_string());
        }
    }
    Ok(params)
}

/// Convenience over [`extract`] for a raw path against a template.
pub fn extract_path(path: &str, template: &PathTemplate) -> EngineResult<PathParams> {
    let actual: Vec<&str> = split(path).collect();
    extract(&actual, template.segments())
}

/// Leading `/`, no trailing `/` (except the root itself).
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    format!("/{trimmed}")
}

/// Segments between the outer separators. Inner empty segments are kept,
/// so `/users//42` has three segments.
pub fn split(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.trim_matches('/');
    (!trimmed.is_empty()).then(|| trimmed.split('/')).into_iter().flatten()
}
