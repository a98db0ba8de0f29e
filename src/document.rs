//! Typed model of the JSON:API request body subset accepted by the adapters.
//!
//! The model keeps two properties the conversion contract depends on:
//!
//! - `data` distinguishes *absent* from an explicit `null` (both occur in
//!   relationship bodies and mean different things), so it deserializes into
//!   the four-state [`Data`] enum instead of an `Option`.
//! - `attributes` and `relationships` keep the key order of the request body.
//!   Validation stops at the first failing field, so which field fails is
//!   defined by body order, not by hash order.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// A deserialized JSON:API request document.
///
/// Resource and relationship endpoints populate `data`; atomic-operations
/// endpoints populate `operations` (the `atomic:operations` member). The
/// adapters decide which member applies based on the request descriptor, not
/// on which member happens to be present.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Document {
    pub data: Data,
    #[serde(rename = "atomic:operations")]
    pub operations: Option<Vec<AtomicOperationObject>>,
    pub meta: Option<Map<String, Value>>,
}

/// The `data` member of a document or relationship object.
///
/// `Absent` means the member did not occur in the body, which is distinct
/// from an explicit `null`. Shapes other than object/array/null are rejected
/// during deserialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Data {
    #[default]
    Absent,
    Null,
    One(ResourceObject),
    Many(Vec<ResourceObject>),
}

impl Data {
    /// Returns `true` when the member did not occur in the body.
    pub fn is_absent(&self) -> bool {
        matches!(self, Data::Absent)
    }

    /// Human-readable description of the shape, used in error details.
    pub fn description(&self) -> &'static str {
        match self {
            Data::Absent => "nothing",
            Data::Null => "'null'",
            Data::One(_) => "an object",
            Data::Many(_) => "an array",
        }
    }
}

impl<'de> Deserialize<'de> for Data {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Null => Ok(Data::Null),
            Value::Object(_) => serde_json::from_value(value)
                .map(Data::One)
                .map_err(de::Error::custom),
            Value::Array(items) => items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Data::Many)
                .map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "expected an object, an array or null for 'data', found {}",
                json_shape_name(&other)
            ))),
        }
    }
}

/// A resource object or resource identifier object.
///
/// Identifier objects are resource objects that happen to carry no
/// attributes or relationships; relationship linkage ignores any that are
/// present rather than modeling a second type.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub id: Option<String>,
    pub lid: Option<String>,
    pub attributes: FieldMap<AttributeValue>,
    pub relationships: FieldMap<RelationshipObject>,
    pub links: Option<Value>,
    pub meta: Option<Map<String, Value>>,
}

impl ResourceObject {
    pub fn identity(&self) -> ResourceIdentity<'_> {
        ResourceIdentity {
            type_name: self.type_name.as_deref(),
            id: self.id.as_deref(),
            lid: self.lid.as_deref(),
        }
    }
}

/// A relationship object inside a resource object's `relationships` map.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelationshipObject {
    pub data: Data,
    pub links: Option<Value>,
    pub meta: Option<Map<String, Value>>,
}

/// One entry of an `atomic:operations` array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AtomicOperationObject {
    pub op: OperationCode,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default, rename = "ref")]
    pub reference: Option<AtomicReference>,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub meta: Option<Map<String, Value>>,
}

/// The `op` code of an atomic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationCode {
    Add,
    Update,
    Remove,
}

impl OperationCode {
    /// Parses the wire form of an operation code.
    pub fn parse(value: &str) -> Option<OperationCode> {
        match value {
            "add" => Some(OperationCode::Add),
            "update" => Some(OperationCode::Update),
            "remove" => Some(OperationCode::Remove),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationCode::Add => "add",
            OperationCode::Update => "update",
            OperationCode::Remove => "remove",
        }
    }
}

impl fmt::Display for OperationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `ref` element of an atomic operation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AtomicReference {
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub id: Option<String>,
    pub lid: Option<String>,
    pub relationship: Option<String>,
}

impl AtomicReference {
    pub fn identity(&self) -> ResourceIdentity<'_> {
        ResourceIdentity {
            type_name: self.type_name.as_deref(),
            id: self.id.as_deref(),
            lid: self.lid.as_deref(),
        }
    }
}

/// Borrowed `{type, id, lid}` view shared by resource objects and operation
/// references.
#[derive(Debug, Clone, Copy)]
pub struct ResourceIdentity<'a> {
    pub type_name: Option<&'a str>,
    pub id: Option<&'a str>,
    pub lid: Option<&'a str>,
}

/// One attribute value as it arrived in the body.
///
/// `Invalid` is the tagged form of a value an upstream typed decoder failed
/// to read. The resource object adapter rejects it with the recorded failure
/// chained instead of treating it as data.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Json(Value),
    Invalid { message: String },
}

impl AttributeValue {
    /// Records an upstream decode failure for this attribute.
    pub fn invalid(message: impl Into<String>) -> AttributeValue {
        AttributeValue::Invalid {
            message: message.into(),
        }
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(AttributeValue::Json)
    }
}

/// An insertion-ordered string-keyed map.
///
/// Used for `attributes` and `relationships`, where body order drives
/// conversion order. A duplicate key overwrites the earlier value in place,
/// matching how `serde_json` treats duplicate object keys.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> FieldMap<T> {
    pub fn new() -> FieldMap<T> {
        FieldMap {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Inserts a value, overwriting in place when the key already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Iterates entries in body order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<T> Default for FieldMap<T> {
    fn default() -> Self {
        FieldMap::new()
    }
}

impl<'de, T> Deserialize<'de> for FieldMap<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FieldMapVisitor<T>(PhantomData<T>);

        impl<'de, T> Visitor<'de> for FieldMapVisitor<T>
        where
            T: Deserialize<'de>,
        {
            type Value = FieldMap<T>;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of field names to values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut map = FieldMap {
                    entries: Vec::with_capacity(access.size_hint().unwrap_or(0)),
                };
                while let Some((key, value)) = access.next_entry::<String, T>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(FieldMapVisitor(PhantomData))
    }
}

/// Returns the JSON type name of a value, for diagnostics.
pub fn json_shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
