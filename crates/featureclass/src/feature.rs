//! Features: named, typed, memoizing computations over an instance.

use std::fmt;
use std::sync::Arc;

use crate::class::FeatureClass;
use crate::error::{BoxError, ComputationFailure, Result};
use crate::types::{FeatureType, FeatureValue};
use crate::value::Value;

type ComputeFn<T> = dyn Fn(&T) -> std::result::Result<Value, BoxError> + Send + Sync;
type InheritedFn<T> = dyn Fn(&T) -> Result<Arc<Value>> + Send + Sync;

/// Handler invoked with the instance, the feature key and the failure.
pub type ErrorHandler<T> = dyn Fn(&T, &str, &ComputationFailure) -> Value + Send + Sync;

/// What a feature read does when the computation fails.
pub enum OnError<T> {
    /// Return the failure; nothing is cached and the next read retries.
    Propagate,
    /// Return and cache this value instead.
    Substitute(Value),
    /// Return and cache whatever the handler produces.
    Handle(Arc<ErrorHandler<T>>),
}

impl<T> OnError<T> {
    pub fn substitute(value: impl Into<Value>) -> Self {
        OnError::Substitute(value.into())
    }

    pub fn handle<F>(handler: F) -> Self
    where
        F: Fn(&T, &str, &ComputationFailure) -> Value + Send + Sync + 'static,
    {
        OnError::Handle(Arc::new(handler))
    }

    pub fn is_propagate(&self) -> bool {
        matches!(self, OnError::Propagate)
    }
}

impl<T> Default for OnError<T> {
    fn default() -> Self {
        OnError::Propagate
    }
}

impl<T> Clone for OnError<T> {
    fn clone(&self) -> Self {
        match self {
            OnError::Propagate => OnError::Propagate,
            OnError::Substitute(value) => OnError::Substitute(value.clone()),
            OnError::Handle(handler) => OnError::Handle(Arc::clone(handler)),
        }
    }
}

impl<T> fmt::Debug for OnError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnError::Propagate => f.write_str("Propagate"),
            OnError::Substitute(value) => f.debug_tuple("Substitute").field(value).finish(),
            OnError::Handle(_) => f.write_str("Handle(..)"),
        }
    }
}

enum Source<T> {
    /// Computed here and cached in the instance's own cache.
    Compute(Arc<ComputeFn<T>>),
    /// Read through to a parent class's feature and cache.
    Inherited(Arc<InheritedFn<T>>),
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        match self {
            Source::Compute(f) => Source::Compute(Arc::clone(f)),
            Source::Inherited(f) => Source::Inherited(Arc::clone(f)),
        }
    }
}

/// A memoizing computed attribute declared on a featureclass.
///
/// `key` is the identifier the feature is declared and cached under;
/// `name` is what metadata and exports report, and defaults to `key`.
pub struct Feature<T> {
    key: String,
    name: String,
    result_type: FeatureType,
    source: Source<T>,
    on_error: OnError<T>,
}

impl<T: 'static> Feature<T> {
    /// A feature whose computation may fail.
    pub fn new<R, F>(key: impl Into<String>, compute: F) -> Self
    where
        R: FeatureValue,
        F: Fn(&T) -> std::result::Result<R, BoxError> + Send + Sync + 'static,
    {
        let compute = move |this: &T| -> std::result::Result<Value, BoxError> {
            Ok(compute(this)?.into_value()?)
        };
        let key = key.into();
        Self {
            name: key.clone(),
            key,
            result_type: R::feature_type(),
            source: Source::Compute(Arc::new(compute)),
            on_error: OnError::Propagate,
        }
    }

    /// A feature whose computation cannot fail.
    pub fn infallible<R, F>(key: impl Into<String>, compute: F) -> Self
    where
        R: FeatureValue,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        Self::new(key, move |this: &T| Ok(compute(this)))
    }

    /// Export under a different name than the key.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn on_error(mut self, policy: OnError<T>) -> Self {
        self.on_error = policy;
        self
    }

    /// Shorthand for `on_error(OnError::substitute(value))`.
    pub fn substitute(self, value: impl Into<Value>) -> Self {
        self.on_error(OnError::substitute(value))
    }

    /// Shorthand for `on_error(OnError::handle(handler))`.
    pub fn handle<F>(self, handler: F) -> Self
    where
        F: Fn(&T, &str, &ComputationFailure) -> Value + Send + Sync + 'static,
    {
        self.on_error(OnError::handle(handler))
    }

    /// Bring a parent's feature into a child class.
    ///
    /// Reads on the child go through `project` to the parent feature, so the
    /// value is cached once, in the parent's cache, under the parent's policy.
    pub(crate) fn lift<C: 'static>(&self, project: fn(&C) -> &T) -> Feature<C>
    where
        T: FeatureClass,
    {
        let parent = self.clone();
        Feature {
            key: self.key.clone(),
            name: self.name.clone(),
            result_type: self.result_type.clone(),
            source: Source::Inherited(Arc::new(move |child: &C| parent.get(project(child)))),
            on_error: OnError::Propagate,
        }
    }
}

impl<T> Feature<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn result_type(&self) -> &FeatureType {
        &self.result_type
    }

    /// Error policy applied by this feature. Inherited features apply their
    /// parent's policy and report `Propagate` here.
    pub fn policy(&self) -> &OnError<T> {
        &self.on_error
    }

    pub fn is_inherited(&self) -> bool {
        matches!(self.source, Source::Inherited(_))
    }
}

impl<T: FeatureClass> Feature<T> {
    /// Read the feature on an instance, computing and caching it on first use.
    pub fn get(&self, instance: &T) -> Result<Arc<Value>> {
        let compute = match &self.source {
            Source::Inherited(read) => return read(instance),
            Source::Compute(compute) => compute,
        };

        let cache = instance.feature_cache();
        if let Some(value) = cache.get(&self.key) {
            tracing::trace!("Feature cache hit: {}", self.key);
            return Ok(value);
        }

        tracing::trace!("Computing feature {}", self.key);
        let value = match compute(instance) {
            Ok(value) => value,
            Err(err) => {
                let failure = ComputationFailure::new(self.key.clone(), err);
                match &self.on_error {
                    OnError::Propagate => return Err(failure.into()),
                    OnError::Substitute(value) => {
                        tracing::warn!("{}, substituting {:?}", failure, value);
                        value.clone()
                    }
                    OnError::Handle(handler) => {
                        tracing::warn!("{}, invoking error handler", failure);
                        handler(instance, &self.key, &failure)
                    }
                }
            }
        };

        Ok(cache.insert(&self.key, value))
    }
}

impl<T> Clone for Feature<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            name: self.name.clone(),
            result_type: self.result_type.clone(),
            source: self.source.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

impl<T> fmt::Debug for Feature<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("result_type", &self.result_type)
            .field("inherited", &self.is_inherited())
            .field("on_error", &self.on_error)
            .finish()
    }
}
