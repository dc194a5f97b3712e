//! Configuration for featureclass exports
//!
//! Loaded from TOML:
//!
//! ```toml
//! [export]
//! deep_copy = true
//! qualified_record_names = false
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Library-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureclassConfig {
    /// Export behavior
    pub export: ExportConfig,
}

/// Export configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Hand out independent copies of cached values
    pub deep_copy: bool,
    /// Name records after the fully qualified Rust type instead of the short name
    pub qualified_record_names: bool,
}

impl FeatureclassConfig {
    /// Parse from a TOML string; missing keys take their defaults
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
