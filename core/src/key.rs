//! Entity keys and their two path grammars.
//!
//! - **quoted**: the whole segment value is one string literal, `'abc'`
//!   (`''` escapes a quote). Nothing inside is interpreted.
//! - **structured**: `42`, `(42)`, `'abc'`, `guid'...'`, or a composite
//!   `a=1,b='x'`, optionally wrapped in parentheses.

use crate::error::{EngineError, EngineResult};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    String(String),
    Int64(i64),
    Double(f64),
    Boolean(bool),
    Guid(Uuid),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            KeyValue::Int64(n) => write!(f, "{n}"),
            KeyValue::Double(d) => write!(f, "{d}"),
            KeyValue::Boolean(b) => write!(f, "{b}"),
            KeyValue::Guid(g) => write!(f, "guid'{g}'"),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::String(value.to_string())
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Int64(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKey {
    Single(KeyValue),
    Composite(Vec<(String, KeyValue)>),
}

impl EntityKey {
    pub fn single(value: impl Into<KeyValue>) -> Self {
        EntityKey::Single(value.into())
    }

    /// Quoted-string grammar: the raw value is one string key.
    pub fn parse_quoted(raw: &str) -> Self {
        let inner = raw
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(raw);
        let text = inner
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .map(|s| s.replace("''", "'"))
            .unwrap_or_else(|| inner.to_string());
        EntityKey::Single(KeyValue::String(text))
    }

    /// Structured grammar: single literal or `name=literal` pairs.
    pub fn parse(raw: &str) -> EngineResult<Self> {
        let fail = |reason: &str| EngineError::KeyParse {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(trimmed);
        if inner.is_empty() {
            return Err(fail("empty key"));
        }

        let parts = split_top_level(inner).ok_or_else(|| fail("unterminated string literal"))?;
        if parts.len() == 1 && !has_top_level_eq(parts[0]) {
            let value = parse_literal(parts[0]).ok_or_else(|| fail("unrecognised literal"))?;
            return Ok(EntityKey::Single(value));
        }

        let mut pairs = Vec::with_capacity(parts.len());
        for part in parts {
            let (name, literal) = part
                .split_once('=')
                .ok_or_else(|| fail("composite key part without '='"))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(fail("composite key part without a name"));
            }
            let value = parse_literal(literal).ok_or_else(|| fail("unrecognised literal"))?;
            pairs.push((name.to_string(), value));
        }
        Ok(EntityKey::Composite(pairs))
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Single(value) => write!(f, "{value}"),
            EntityKey::Composite(pairs) => {
                for (i, (name, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{name}={value}")?;
                }
                Ok(())
            }
        }
    }
}

fn split_top_level(input: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut in_string = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            ',' if !in_string => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_string {
        return None;
    }
    parts.push(&input[start..]);
    Some(parts)
}

fn has_top_level_eq(part: &str) -> bool {
    let mut in_string = false;
    part.chars().any(|c| {
        if c == '\'' {
            in_string = !in_string;
        }
        c == '=' && !in_string
    })
}

fn parse_literal(raw: &str) -> Option<KeyValue> {
    let raw = raw.trim();
    if let Some(body) = raw.strip_prefix("guid'").and_then(|s| s.strip_suffix('\'')) {
        return body.parse().ok().map(KeyValue::Guid);
    }
    if let Some(body) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Some(KeyValue::String(body.replace("''", "'")));
    }
    match raw {
        "true" => return Some(KeyValue::Boolean(true)),
        "false" => return Some(KeyValue::Boolean(false)),
        _ => {}
    }
    let number = raw.trim_end_matches(['L', 'l']);
    if let Ok(n) = number.parse::<i64>() {
        return Some(KeyValue::Int64(n));
    }
    let number = raw.trim_end_matches(['d', 'D', 'm', 'M', 'f', 'F']);
    number.parse::<f64>().ok().map(KeyValue::Double)
}
