//! Declared feature types and the conversions between Rust results and [`Value`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ValueError;
use crate::value::Value;

/// Declared result type of a feature.
///
/// `Any` is the placeholder for results whose type is not declared.
/// Serialized in its display notation (`"int"`, `"list[str]"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum FeatureType {
    Any,
    Bool,
    Int,
    Float,
    String,
    List(Box<FeatureType>),
    Map(Box<FeatureType>),
    Optional(Box<FeatureType>),
    /// A structured type, by name.
    Object(String),
}

impl FeatureType {
    pub fn list(inner: FeatureType) -> Self {
        FeatureType::List(Box::new(inner))
    }

    pub fn map(inner: FeatureType) -> Self {
        FeatureType::Map(Box::new(inner))
    }

    pub fn optional(inner: FeatureType) -> Self {
        FeatureType::Optional(Box::new(inner))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, FeatureType::Any)
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureType::Any => f.write_str("any"),
            FeatureType::Bool => f.write_str("bool"),
            FeatureType::Int => f.write_str("int"),
            FeatureType::Float => f.write_str("float"),
            FeatureType::String => f.write_str("str"),
            FeatureType::List(inner) => write!(f, "list[{}]", inner),
            FeatureType::Map(inner) => write!(f, "map[str, {}]", inner),
            FeatureType::Optional(inner) => write!(f, "optional[{}]", inner),
            FeatureType::Object(name) => f.write_str(name),
        }
    }
}

impl From<FeatureType> for String {
    fn from(ty: FeatureType) -> Self {
        ty.to_string()
    }
}

impl From<String> for FeatureType {
    fn from(name: String) -> Self {
        FeatureType::parse(&name)
    }
}

impl FeatureType {
    /// Parse the display notation; unrecognized names are `Object`.
    pub fn parse(name: &str) -> Self {
        fn wrapped<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
            name.strip_prefix(prefix)?.strip_suffix(']')
        }

        match name {
            "any" => FeatureType::Any,
            "bool" => FeatureType::Bool,
            "int" => FeatureType::Int,
            "float" => FeatureType::Float,
            "str" => FeatureType::String,
            _ => {
                if let Some(inner) = wrapped(name, "list[") {
                    FeatureType::list(FeatureType::parse(inner))
                } else if let Some(inner) = wrapped(name, "map[str, ") {
                    FeatureType::map(FeatureType::parse(inner))
                } else if let Some(inner) = wrapped(name, "optional[") {
                    FeatureType::optional(FeatureType::parse(inner))
                } else {
                    FeatureType::Object(name.to_string())
                }
            }
        }
    }
}

/// A Rust type that can be the result of a feature.
///
/// The declared [`FeatureType`] is taken from here when a feature is built,
/// so it is fixed at definition time.
pub trait FeatureValue: Sized + 'static {
    fn feature_type() -> FeatureType;

    fn into_value(self) -> Result<Value, ValueError>;

    /// Read a cached value back; `None` if it does not convert.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FeatureValue for Value {
    fn feature_type() -> FeatureType {
        FeatureType::Any
    }

    fn into_value(self) -> Result<Value, ValueError> {
        Ok(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FeatureValue for bool {
    fn feature_type() -> FeatureType {
        FeatureType::Bool
    }

    fn into_value(self) -> Result<Value, ValueError> {
        Ok(Value::Bool(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

macro_rules! int_feature_value {
    ($($t:ty),*) => {$(
        impl FeatureValue for $t {
            fn feature_type() -> FeatureType {
                FeatureType::Int
            }

            fn into_value(self) -> Result<Value, ValueError> {
                Ok(Value::Int(i64::from(self)))
            }

            fn from_value(value: &Value) -> Option<Self> {
                value.as_i64().and_then(|i| <$t>::try_from(i).ok())
            }
        }
    )*};
}

int_feature_value!(i8, i16, i32, i64, u8, u16, u32);

impl FeatureValue for u64 {
    fn feature_type() -> FeatureType {
        FeatureType::Int
    }

    fn into_value(self) -> Result<Value, ValueError> {
        i64::try_from(self).map(Value::Int).map_err(|e| ValueError {
            type_name: "u64".into(),
            message: e.to_string(),
        })
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|i| u64::try_from(i).ok())
    }
}

impl FeatureValue for usize {
    fn feature_type() -> FeatureType {
        FeatureType::Int
    }

    fn into_value(self) -> Result<Value, ValueError> {
        i64::try_from(self).map(Value::Int).map_err(|e| ValueError {
            type_name: "usize".into(),
            message: e.to_string(),
        })
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64().and_then(|i| usize::try_from(i).ok())
    }
}

impl FeatureValue for f64 {
    fn feature_type() -> FeatureType {
        FeatureType::Float
    }

    fn into_value(self) -> Result<Value, ValueError> {
        Ok(Value::Float(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FeatureValue for f32 {
    fn feature_type() -> FeatureType {
        FeatureType::Float
    }

    fn into_value(self) -> Result<Value, ValueError> {
        Ok(Value::Float(f64::from(self)))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64().map(|f| f as f32)
    }
}

impl FeatureValue for String {
    fn feature_type() -> FeatureType {
        FeatureType::String
    }

    fn into_value(self) -> Result<Value, ValueError> {
        Ok(Value::String(self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl<V: FeatureValue> FeatureValue for Vec<V> {
    fn feature_type() -> FeatureType {
        FeatureType::list(V::feature_type())
    }

    fn into_value(self) -> Result<Value, ValueError> {
        self.into_iter()
            .map(V::into_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_array()?.iter().map(V::from_value).collect()
    }
}

impl<V: FeatureValue> FeatureValue for BTreeMap<String, V> {
    fn feature_type() -> FeatureType {
        FeatureType::map(V::feature_type())
    }

    fn into_value(self) -> Result<Value, ValueError> {
        self.into_iter()
            .map(|(k, v)| v.into_value().map(|v| (k, v)))
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(Value::Object)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_object()?
            .iter()
            .map(|(k, v)| V::from_value(v).map(|v| (k.clone(), v)))
            .collect()
    }
}

impl<V: FeatureValue> FeatureValue for Option<V> {
    fn feature_type() -> FeatureType {
        FeatureType::optional(V::feature_type())
    }

    fn into_value(self) -> Result<Value, ValueError> {
        match self {
            Some(v) => v.into_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => V::from_value(other).map(Some),
        }
    }
}

/// Wraps a serde type so it can be a feature result.
///
/// Stored through `serde_json`; declared as `Object(<type name>)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<V>(pub V);

impl<V> Json<V> {
    pub fn into_inner(self) -> V {
        self.0
    }
}

impl<V: Serialize + DeserializeOwned + 'static> FeatureValue for Json<V> {
    fn feature_type() -> FeatureType {
        FeatureType::Object(short_type_name(std::any::type_name::<V>()).to_string())
    }

    fn into_value(self) -> Result<Value, ValueError> {
        serde_json::to_value(&self.0)
            .map(Value::from)
            .map_err(|e| ValueError {
                type_name: std::any::type_name::<V>().to_string(),
                message: e.to_string(),
            })
    }

    fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(serde_json::Value::from(value.clone()))
            .ok()
            .map(Json)
    }
}

/// Type name without its module path (`a::b::Point<c::D>` becomes `Point<c::D>`).
pub(crate) fn short_type_name(full: &str) -> &str {
    let end = full.find('<').unwrap_or(full.len());
    let start = full[..end].rfind("::").map(|i| i + 2).unwrap_or(0);
    &full[start..]
}

/// Ordered mapping from attribute name to declared type.
///
/// Inserting an existing name replaces its type in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    entries: Vec<(String, FeatureType)>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the previous type for this name.
    pub fn insert(&mut self, name: impl Into<String>, ty: FeatureType) -> Option<FeatureType> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, ty)),
            None => {
                self.entries.push((name, ty));
                None
            }
        }
    }

    /// Merge another mapping into this one; `other` wins on conflicts.
    pub fn merge(&mut self, other: &Annotations) {
        for (name, ty) in other.iter() {
            self.insert(name, ty.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&FeatureType> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureType)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, FeatureType)> for Annotations {
    fn from_iter<I: IntoIterator<Item = (N, FeatureType)>>(iter: I) -> Self {
        let mut annotations = Annotations::new();
        for (name, ty) in iter {
            annotations.insert(name, ty);
        }
        annotations
    }
}

impl Serialize for Annotations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, ty) in &self.entries {
            map.serialize_entry(name, &ty.to_string())?;
        }
        map.end()
    }
}
