//! Featureclass declaration: the trait a type implements and the builder its
//! features are declared on.

use std::collections::HashSet;

use crate::cache::FeatureCache;
use crate::error::BoxError;
use crate::feature::Feature;
use crate::registry::featureclass;
use crate::types::{short_type_name, Annotations, FeatureValue};

/// A type whose features can be decorated into a class registry.
///
/// ```
/// use featureclass::{featureclass, feature_names, ClassBuilder, FeatureCache, FeatureClass, FeatureObject};
///
/// #[derive(Default)]
/// struct Square {
///     side: i64,
///     cache: FeatureCache,
/// }
///
/// impl FeatureClass for Square {
///     fn features(class: &mut ClassBuilder<Self>) {
///         class
///             .computed("area", |s| s.side * s.side)
///             .feature("double_area", |s| {
///                 let area: i64 = s.feature("area")?;
///                 Ok(area * 2)
///             });
///     }
///
///     fn feature_cache(&self) -> &FeatureCache {
///         &self.cache
///     }
/// }
///
/// featureclass::<Square>();
/// let square = Square { side: 3, ..Default::default() };
/// assert_eq!(square.feature::<i64>("double_area").unwrap(), 18);
/// assert_eq!(feature_names::<Square>().unwrap(), vec!["area", "double_area"]);
/// ```
pub trait FeatureClass: Sized + 'static {
    /// Declare the class's features, in order.
    fn features(class: &mut ClassBuilder<Self>);

    /// Type metadata the class carries besides its features.
    fn annotations(annotations: &mut Annotations) {
        let _ = annotations;
    }

    fn feature_cache(&self) -> &FeatureCache;

    fn class_name() -> String {
        short_type_name(std::any::type_name::<Self>()).to_string()
    }
}

/// Collects the features of one class during decoration.
pub struct ClassBuilder<T> {
    features: Vec<Feature<T>>,
    declared_keys: HashSet<String>,
    declared_names: HashSet<String>,
}

impl<T: FeatureClass> ClassBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            features: Vec::new(),
            declared_keys: HashSet::new(),
            declared_names: HashSet::new(),
        }
    }

    /// Add a feature. A feature with the same key or name replaces the
    /// earlier entry and keeps its position.
    pub fn add(&mut self, feature: Feature<T>) -> &mut Self {
        if self.declared_keys.contains(feature.key()) || self.declared_names.contains(feature.name())
        {
            tracing::warn!(
                "Feature '{}' declared twice on {}, keeping the later declaration",
                feature.name(),
                T::class_name()
            );
        }
        self.declared_keys.insert(feature.key().to_string());
        self.declared_names.insert(feature.name().to_string());
        self.place(feature);
        self
    }

    /// Declare a feature whose computation may fail.
    pub fn feature<R, F>(&mut self, key: impl Into<String>, compute: F) -> &mut Self
    where
        R: FeatureValue,
        F: Fn(&T) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        self.add(Feature::new(key, compute))
    }

    /// Declare a feature whose computation cannot fail.
    pub fn computed<R, F>(&mut self, key: impl Into<String>, compute: F) -> &mut Self
    where
        R: FeatureValue,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.add(Feature::infallible(key, compute))
    }

    /// Inherit every feature of `P`, read through `project`.
    ///
    /// `P` is decorated first if it has not been. Inherited features come
    /// before the ones declared after this call, and an own feature with the
    /// same name overrides the inherited one in place.
    pub fn inherit<P: FeatureClass>(&mut self, project: fn(&T) -> &P) -> &mut Self {
        let parent = featureclass::<P>();
        for feature in parent.features() {
            self.place(feature.lift(project));
        }
        self
    }

    fn place(&mut self, feature: Feature<T>) {
        let clashes = |f: &Feature<T>| f.key() == feature.key() || f.name() == feature.name();
        match self.features.iter().position(clashes) {
            Some(pos) => {
                let mut index = 0;
                self.features.retain(|f| {
                    let keep = index <= pos || !clashes(f);
                    index += 1;
                    keep
                });
                self.features[pos] = feature;
            }
            None => self.features.push(feature),
        }
    }

    pub(crate) fn finish(self) -> Vec<Feature<T>> {
        self.features
    }
}

/// Feature annotations of an ordered feature list.
pub(crate) fn annotations_of<T>(features: &[Feature<T>]) -> Annotations {
    features
        .iter()
        .map(|f| (f.name().to_string(), f.result_type().clone()))
        .collect::<Annotations>()
}
