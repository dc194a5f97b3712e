//! Per-instance storage for computed feature values.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::value::Value;

/// Feature values computed for one instance, keyed by feature key.
///
/// Embed one in every featureclass instance and return it from
/// [`FeatureClass::feature_cache`](crate::FeatureClass::feature_cache).
/// Entries are created on first read and live as long as the cache.
///
/// The lock is never held while a feature is computed, so concurrent first
/// reads may both compute; the first stored value wins and is what every
/// reader gets back.
#[derive(Default)]
pub struct FeatureCache {
    slots: RwLock<HashMap<String, Arc<Value>>>,
}

impl FeatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Store a value unless one is already present. Returns the stored value.
    pub(crate) fn insert(&self, key: &str, value: Value) -> Arc<Value> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(value))
            .clone()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Keys with a cached value, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A cloned instance starts with an empty cache.
impl Clone for FeatureCache {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl fmt::Debug for FeatureCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureCache")
            .field("cached", &self.keys())
            .finish()
    }
}
