//! Mapper configuration and its TOML form.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a [`Mapper`](crate::Mapper).
///
/// ```toml
/// strict = false
/// atomic_upsert = true
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Return absorbed configuration, codec and instantiation problems as
    /// errors instead of listing them in reports.
    pub strict: bool,
    /// Use the collection's single-call `upsert_one` instead of a find
    /// followed by insert or update. Closes the insert race on backends that
    /// implement `upsert_one` atomically.
    pub atomic_upsert: bool,
}

impl MapperConfig {
    /// A configuration that fails fast on any absorbed problem.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }

    /// Parse from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}
