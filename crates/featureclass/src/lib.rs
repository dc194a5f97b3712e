//! featureclass: per-instance memoized features on plain Rust types.
//!
//! A featureclass declares *features*: named, typed computations over an
//! instance. Reading a feature computes it once per instance and caches the
//! result; later reads return the cached value. Decorating the class with
//! [`featureclass`] publishes its ordered feature registry, which the metadata
//! readers ([`feature_names`], [`feature_annotations`]) and exporters
//! ([`as_mapping`], [`as_record`]) work from.
//!
//! # Error policies
//!
//! A failing computation either propagates (nothing cached, next read
//! retries), is replaced by a fixed value, or is handed to a handler whose
//! result is used. Substituted and handled values are cached like successes.

pub mod cache;
pub mod class;
pub mod config;
pub mod error;
pub mod export;
pub mod feature;
pub mod registry;
pub mod types;
pub mod value;

pub use cache::*;
pub use class::*;
pub use config::*;
pub use error::*;
pub use export::*;
pub use feature::*;
pub use registry::*;
pub use types::*;
pub use value::*;
