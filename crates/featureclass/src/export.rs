//! Exporting feature values: name/value mappings and ad-hoc records.

use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::class::FeatureClass;
use crate::config::ExportConfig;
use crate::error::{FeatureclassError, Result};
use crate::registry::{registry, ClassRegistry};
use crate::types::{Annotations, FeatureType};
use crate::value::Value;

/// Feature values of one instance, in registry order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMap {
    entries: Vec<(String, Arc<Value>)>,
}

impl FeatureMap {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.get_shared(name).map(|v| v.as_ref())
    }

    /// The value as stored, sharing its allocation unless deep-copied.
    pub fn get_shared(&self, name: &str) -> Option<&Arc<Value>> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(n, v)| (n.clone(), Value::clone(v).into()))
                .collect(),
        )
    }
}

impl IntoIterator for FeatureMap {
    type Item = (String, Arc<Value>);
    type IntoIter = std::vec::IntoIter<(String, Arc<Value>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for FeatureMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value.as_ref())?;
        }
        map.end()
    }
}

/// A field of an ad-hoc record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    pub field_type: FeatureType,
}

/// Ad-hoc record type mirroring a class's feature registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<RecordField>,
}

impl RecordSchema {
    fn of<T: FeatureClass>(registry: &ClassRegistry<T>, config: &ExportConfig) -> Self {
        let name = if config.qualified_record_names {
            registry.type_name().to_string()
        } else {
            registry.class_name().to_string()
        };
        Self {
            name,
            fields: registry
                .features()
                .iter()
                .map(|f| RecordField {
                    name: f.name().to_string(),
                    field_type: f.result_type().clone(),
                })
                .collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&RecordField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn annotations(&self) -> Annotations {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.field_type.clone()))
            .collect()
    }

    /// Build a record from a value per field. Every field needs a value and
    /// no other names are accepted; values are not type-checked.
    pub fn instantiate<I, K, V>(&self, values: I) -> Result<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Arc<Value>>,
    {
        let mut given: HashMap<String, Arc<Value>> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut ordered = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = given
                .remove(&field.name)
                .ok_or_else(|| FeatureclassError::MissingField {
                    record: self.name.clone(),
                    field: field.name.clone(),
                })?;
            ordered.push(value);
        }

        let mut extra: Vec<String> = given.into_keys().collect();
        extra.sort();
        if let Some(field) = extra.into_iter().next() {
            return Err(FeatureclassError::UnexpectedField {
                record: self.name.clone(),
                field,
            });
        }

        Ok(Record {
            schema: Arc::new(self.clone()),
            values: ordered,
        })
    }
}

/// An instance of a [`RecordSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    schema: Arc<RecordSchema>,
    values: Vec<Arc<Value>>,
}

impl Record {
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema
            .fields
            .iter()
            .position(|f| f.name == name)
            .map(|i| self.values[i].as_ref())
    }

    /// Field, declared type and value, in field order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FeatureType, &Value)> {
        self.schema
            .fields
            .iter()
            .zip(&self.values)
            .map(|(f, v)| (f.name.as_str(), &f.field_type, v.as_ref()))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields()
                .map(|(name, _, value)| (name.to_string(), value.clone().into()))
                .collect(),
        )
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, _, value) in self.fields() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Current value of every feature of `instance`, computing as needed.
///
/// With `deep_copy` the values are independent copies; otherwise they share
/// their allocation with the instance's cache.
pub fn as_mapping<T: FeatureClass>(instance: &T, deep_copy: bool) -> Result<FeatureMap> {
    let registry = registry::<T>()?;
    let mut entries = Vec::with_capacity(registry.len());
    for feature in registry.features() {
        let value = feature.get(instance)?;
        let value = if deep_copy {
            Arc::new(Value::clone(&value))
        } else {
            value
        };
        entries.push((feature.name().to_string(), value));
    }
    Ok(FeatureMap { entries })
}

pub fn as_mapping_with<T: FeatureClass>(instance: &T, config: &ExportConfig) -> Result<FeatureMap> {
    as_mapping(instance, config.deep_copy)
}

/// The record type of a decorated class.
pub fn record_schema<T: FeatureClass>() -> Result<RecordSchema> {
    record_schema_with::<T>(&ExportConfig::default())
}

pub fn record_schema_with<T: FeatureClass>(config: &ExportConfig) -> Result<RecordSchema> {
    let registry = registry::<T>()?;
    Ok(RecordSchema::of(&registry, config))
}

/// A populated record of `instance`'s feature values.
pub fn as_record<T: FeatureClass>(instance: &T, deep_copy: bool) -> Result<Record> {
    let config = ExportConfig {
        deep_copy,
        ..ExportConfig::default()
    };
    as_record_with(instance, &config)
}

pub fn as_record_with<T: FeatureClass>(instance: &T, config: &ExportConfig) -> Result<Record> {
    let schema = record_schema_with::<T>(config)?;
    schema.instantiate(as_mapping_with(instance, config)?)
}
