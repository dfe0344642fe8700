//! Engine selection.
//!
//! Read from the environment (`RULEENGINE_TYPE=simple`) or from TOML
//! (`type = "drools"`). Engine names ignore case. Missing keys fall back to
//! the defaults.

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::EngineKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Which evaluation engine classifiers run.
    #[serde(rename = "type")]
    pub engine: EngineKind,
}

impl ClassifierConfig {
    /// Load from `RULEENGINE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to an unknown value.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("RULEENGINE").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Load from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document is malformed or names an
    /// unknown engine.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
