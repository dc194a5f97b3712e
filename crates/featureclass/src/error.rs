//! Error types for featureclass

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::types::FeatureType;

/// Result type alias for featureclass operations
pub type Result<T> = std::result::Result<T, FeatureclassError>;

/// Error a feature computation may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for featureclass operations
#[derive(Error, Debug)]
pub enum FeatureclassError {
    /// Metadata or export requested for a type that was never decorated
    #[error("must be called with a featureclass or a featureclass instance, {type_name} was never decorated")]
    InvalidTarget { type_name: String },

    /// A feature computation failed and its policy propagates failures
    #[error(transparent)]
    Computation(#[from] ComputationFailure),

    /// No feature with this key or name
    #[error("featureclass {class} has no feature '{feature}'")]
    UnknownFeature { class: String, feature: String },

    /// The cached value does not convert to the requested type
    #[error("feature '{feature}' holds {found}, expected {expected}")]
    TypeMismatch {
        feature: String,
        expected: FeatureType,
        found: &'static str,
    },

    /// Record instantiation without a value for a declared field
    #[error("record {record} is missing field '{field}'")]
    MissingField { record: String, field: String },

    /// Record instantiation with a value for an undeclared field
    #[error("record {record} has no field '{field}'")]
    UnexpectedField { record: String, field: String },

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl FeatureclassError {
    /// The computation failure behind this error, if any.
    pub fn as_computation(&self) -> Option<&ComputationFailure> {
        match self {
            FeatureclassError::Computation(failure) => Some(failure),
            _ => None,
        }
    }
}

/// A feature computation that returned an error.
#[derive(Debug, Clone)]
pub struct ComputationFailure {
    feature: String,
    error: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl ComputationFailure {
    pub fn new(feature: impl Into<String>, error: BoxError) -> Self {
        Self {
            feature: feature.into(),
            error: Arc::from(error),
        }
    }

    /// Key of the feature whose computation failed.
    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// The error returned by the computation.
    pub fn error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.error.as_ref()
    }
}

impl fmt::Display for ComputationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "feature '{}' failed: {}", self.feature, self.error)
    }
}

impl std::error::Error for ComputationFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.error.as_ref())
    }
}

/// A feature result that could not be turned into a [`Value`](crate::Value).
#[derive(Error, Debug)]
#[error("cannot store {type_name} as a feature value: {message}")]
pub struct ValueError {
    pub type_name: String,
    pub message: String,
}
