//! Class registries: decoration, lookup and metadata readers.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::class::{annotations_of, ClassBuilder, FeatureClass};
use crate::error::{FeatureclassError, Result};
use crate::feature::Feature;
use crate::types::{Annotations, FeatureValue};
use crate::value::Value;

lazy_static::lazy_static! {
    /// Published class registries, keyed by the decorated type.
    static ref CLASSES: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>> = RwLock::new(HashMap::new());
}

/// The features of one decorated class.
///
/// Built once by [`featureclass`] and read-only afterwards.
pub struct ClassRegistry<T> {
    class_name: String,
    type_name: &'static str,
    features: Vec<Feature<T>>,
    annotations: Annotations,
}

impl<T: FeatureClass> ClassRegistry<T> {
    fn build() -> Self {
        let mut class = ClassBuilder::new();
        T::features(&mut class);
        let features = class.finish();

        let mut annotations = Annotations::new();
        T::annotations(&mut annotations);
        annotations.merge(&annotations_of(&features));

        Self {
            class_name: T::class_name(),
            type_name: std::any::type_name::<T>(),
            features,
            annotations,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Fully qualified Rust type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn features(&self) -> &[Feature<T>] {
        &self.features
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name().to_string()).collect()
    }

    /// Declared result types of the features only.
    pub fn feature_annotations(&self) -> Annotations {
        annotations_of(&self.features)
    }

    /// The class's full annotation mapping, features merged in.
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Find a feature by exported name, falling back to its key.
    ///
    /// Names win so a read by name agrees with exports and annotations.
    pub fn find(&self, ident: &str) -> Option<&Feature<T>> {
        self.features
            .iter()
            .find(|f| f.name() == ident)
            .or_else(|| self.features.iter().find(|f| f.key() == ident))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn lookup<T: FeatureClass>() -> Option<Arc<ClassRegistry<T>>> {
    let classes = CLASSES.read().unwrap_or_else(PoisonError::into_inner);
    classes
        .get(&TypeId::of::<T>())
        .cloned()
        .and_then(|entry| entry.downcast::<ClassRegistry<T>>().ok())
}

/// Decorate `T`: collect its features and publish them as its registry.
///
/// Idempotent; later calls return the registry published by the first.
pub fn featureclass<T: FeatureClass>() -> Arc<ClassRegistry<T>> {
    if let Some(registry) = lookup::<T>() {
        return registry;
    }

    // Built outside the lock, parents may need decorating first.
    let built: Arc<ClassRegistry<T>> = Arc::new(ClassRegistry::build());

    let mut classes = CLASSES.write().unwrap_or_else(PoisonError::into_inner);
    let entry = classes.entry(TypeId::of::<T>()).or_insert_with(|| {
        tracing::debug!(
            "Decorated featureclass {} with {} features",
            built.class_name(),
            built.len()
        );
        Arc::clone(&built) as Arc<dyn Any + Send + Sync>
    });
    match Arc::clone(entry).downcast::<ClassRegistry<T>>() {
        Ok(registry) => registry,
        Err(_) => built,
    }
}

/// The registry of a decorated class.
pub fn registry<T: FeatureClass>() -> Result<Arc<ClassRegistry<T>>> {
    lookup::<T>().ok_or_else(|| FeatureclassError::InvalidTarget {
        type_name: std::any::type_name::<T>().to_string(),
    })
}

pub fn is_featureclass<T: FeatureClass>() -> bool {
    lookup::<T>().is_some()
}

/// Feature names of a decorated class, in registry order.
pub fn feature_names<T: FeatureClass>() -> Result<Vec<String>> {
    Ok(registry::<T>()?.feature_names())
}

pub fn feature_names_of<T: FeatureClass>(_instance: &T) -> Result<Vec<String>> {
    feature_names::<T>()
}

/// Feature name to declared result type.
pub fn feature_annotations<T: FeatureClass>() -> Result<Annotations> {
    Ok(registry::<T>()?.feature_annotations())
}

pub fn feature_annotations_of<T: FeatureClass>(_instance: &T) -> Result<Annotations> {
    feature_annotations::<T>()
}

/// The class's own annotations merged with its feature annotations.
pub fn class_annotations<T: FeatureClass>() -> Result<Annotations> {
    Ok(registry::<T>()?.annotations().clone())
}

/// Feature reads on instances of decorated classes.
pub trait FeatureObject: FeatureClass {
    /// The cached value of a feature, computing it on first read.
    fn feature_value(&self, ident: &str) -> Result<Arc<Value>> {
        let registry = registry::<Self>()?;
        let feature = registry
            .find(ident)
            .ok_or_else(|| FeatureclassError::UnknownFeature {
                class: registry.class_name().to_string(),
                feature: ident.to_string(),
            })?;
        feature.get(self)
    }

    /// Typed read of a feature.
    fn feature<R: FeatureValue>(&self, ident: &str) -> Result<R> {
        let value = self.feature_value(ident)?;
        R::from_value(&value).ok_or_else(|| FeatureclassError::TypeMismatch {
            feature: ident.to_string(),
            expected: R::feature_type(),
            found: value.type_name(),
        })
    }
}

impl<T: FeatureClass> FeatureObject for T {}
