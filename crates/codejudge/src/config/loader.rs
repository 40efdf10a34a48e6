//! Configuration file loading for codejudge
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};

use crate::config::{Config, ConfigError};
use crate::types::LanguageId;

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.staging_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("staging_root is empty".to_owned()));
        }

        for (id, lang) in &self.languages {
            let language: LanguageId = id
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("{e} in [languages.{id}]")))?;

            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty name"
                )));
            }
            if lang.source_name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty source_name"
                )));
            }
            if lang.compile.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty compile command"
                )));
            }
            if lang.run.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty run command"
                )));
            }
            if language.is_class_based()
                && lang.source_name.as_str() != format!("{}.java", lang.class_name())
            {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' source_name must be '{}.java'",
                    lang.class_name()
                )));
            }
        }

        Ok(())
    }
}
