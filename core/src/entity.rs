//! Entity model: property bags, typed entities and their pre-fetched relations.

use crate::key::EntityKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Boolean(bool),
    Int64(i64),
    Double(f64),
    DateTime(DateTime<Utc>),
    Guid(Uuid),
    String(String),
}

impl PropertyValue {
    /// EDM type name used on the wire.
    pub fn edm_type(&self) -> &'static str {
        match self {
            PropertyValue::Null | PropertyValue::String(_) => "Edm.String",
            PropertyValue::Boolean(_) => "Edm.Boolean",
            PropertyValue::Int64(_) => "Edm.Int64",
            PropertyValue::Double(_) => "Edm.Double",
            PropertyValue::DateTime(_) => "Edm.DateTime",
            PropertyValue::Guid(_) => "Edm.Guid",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Textual form used when filling path templates.
    pub fn as_path_value(&self) -> Option<String> {
        match self {
            PropertyValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Parse a wire value according to its declared EDM type.
    pub fn from_edm(edm_type: Option<&str>, text: &str) -> Option<Self> {
        let value = match edm_type.unwrap_or("Edm.String") {
            "Edm.Boolean" => PropertyValue::Boolean(text.parse().ok()?),
            "Edm.Int16" | "Edm.Int32" | "Edm.Int64" | "Edm.Byte" => {
                PropertyValue::Int64(text.parse().ok()?)
            }
            "Edm.Double" | "Edm.Single" | "Edm.Decimal" => PropertyValue::Double(text.parse().ok()?),
            "Edm.DateTime" | "Edm.DateTimeOffset" => PropertyValue::DateTime(
                DateTime::parse_from_rfc3339(text)
                    .map(|dt| dt.with_timezone(&Utc))
                    .or_else(|_| {
                        chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                            .map(|naive| naive.and_utc())
                    })
                    .ok()?,
            ),
            "Edm.Guid" => PropertyValue::Guid(text.parse().ok()?),
            _ => PropertyValue::String(text.to_string()),
        };
        Some(value)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => Ok(()),
            PropertyValue::Boolean(b) => write!(f, "{b}"),
            PropertyValue::Int64(n) => write!(f, "{n}"),
            PropertyValue::Double(d) => write!(f, "{d}"),
            PropertyValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            PropertyValue::Guid(g) => write!(f, "{g}"),
            PropertyValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int64(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int64(value.into())
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        PropertyValue::DateTime(value)
    }
}

impl From<Uuid> for PropertyValue {
    fn from(value: Uuid) -> Self {
        PropertyValue::Guid(value)
    }
}

/// Name -> value mapping; names are unique, iteration is sorted by name.
pub type EntityProperties = BTreeMap<String, PropertyValue>;

/// A named bag of properties.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub properties: EntityProperties,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: EntityProperties::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Convert any serializable bean into a generic property bag.
    ///
    /// Top-level scalar fields become properties; nested objects and arrays
    /// are carried as their JSON text.
    pub fn from_serialize<T: Serialize>(name: impl Into<String>, bean: &T) -> serde_json::Result<Self> {
        let mut entity = Entity::new(name);
        if let serde_json::Value::Object(fields) = serde_json::to_value(bean)? {
            for (field, value) in fields {
                entity.properties.insert(field, json_to_property(value));
            }
        }
        Ok(entity)
    }
}

fn json_to_property(value: serde_json::Value) -> PropertyValue {
    use serde_json::Value;
    match value {
        Value::Null => PropertyValue::Null,
        Value::Bool(b) => PropertyValue::Boolean(b),
        Value::Number(n) => n
            .as_i64()
            .map(PropertyValue::Int64)
            .or_else(|| n.as_f64().map(PropertyValue::Double))
            .unwrap_or_else(|| PropertyValue::String(n.to_string())),
        Value::String(s) => PropertyValue::String(s),
        nested => PropertyValue::String(nested.to_string()),
    }
}

/// A richer, externally-typed entity: addressed by entity set and key, and
/// possibly carrying related entities the data layer fetched alongside it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypedEntity {
    pub entity_set: String,
    pub key: Option<EntityKey>,
    pub properties: EntityProperties,
    pub relations: Vec<Relation>,
}

impl TypedEntity {
    pub fn new(entity_set: impl Into<String>, key: Option<EntityKey>) -> Self {
        Self {
            entity_set: entity_set.into(),
            key,
            ..Default::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// `EntitySet(key)`, the entity's path relative to the service root.
    pub fn rel_id(&self) -> String {
        match &self.key {
            Some(key) => format!("{}({})", self.entity_set, key),
            None => self.entity_set.clone(),
        }
    }
}

/// A related entity (or entities) fetched together with its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    /// Declared navigation title, e.g. `Orders`.
    pub title: String,
    pub related: Related,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    Single(Box<TypedEntity>),
    Many(Vec<TypedEntity>),
}

impl Relation {
    pub fn single(title: impl Into<String>, entity: TypedEntity) -> Self {
        Self {
            title: title.into(),
            related: Related::Single(Box::new(entity)),
        }
    }

    pub fn many(title: impl Into<String>, entities: Vec<TypedEntity>) -> Self {
        Self {
            title: title.into(),
            related: Related::Many(entities),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.related, Related::Many(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyValue;

    #[derive(Serialize)]
    struct User {
        user_id: i64,
        twitter_handle: String,
        verified: bool,
        tags: Vec<String>,
    }

    #[test]
    fn test_from_serialize() {
        let user = User {
            user_id: 7,
            twitter_handle: "aphethean".into(),
            verified: true,
            tags: vec!["a".into()],
        };
        let entity = Entity::from_serialize("User", &user).unwrap();
        assert_eq!(entity.name, "User");
        assert_eq!(entity.get("user_id"), Some(&PropertyValue::Int64(7)));
        assert_eq!(entity.get("verified"), Some(&PropertyValue::Boolean(true)));
        assert_eq!(
            entity.get("tags"),
            Some(&PropertyValue::String("[\"a\"]".into()))
        );
    }

    #[test]
    fn test_edm_parsing() {
        assert_eq!(
            PropertyValue::from_edm(Some("Edm.Int32"), "12"),
            Some(PropertyValue::Int64(12))
        );
        assert_eq!(PropertyValue::from_edm(Some("Edm.Int32"), "x"), None);
        assert_eq!(
            PropertyValue::from_edm(None, "plain"),
            Some(PropertyValue::String("plain".into()))
        );
        let dt = PropertyValue::from_edm(Some("Edm.DateTime"), "2013-05-01T10:20:30").unwrap();
        assert_eq!(dt.to_string(), "2013-05-01T10:20:30");
    }

    #[test]
    fn test_rel_id() {
        let customer = TypedEntity::new("Customers", Some(EntityKey::single(KeyValue::from("ALFKI"))));
        assert_eq!(customer.rel_id(), "Customers('ALFKI')");
        assert_eq!(TypedEntity::new("Customers", None).rel_id(), "Customers");
    }
}
