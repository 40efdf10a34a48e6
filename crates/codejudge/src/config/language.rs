use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;

const INVALID_FILE_NAME_CHARS: [char; 2] = ['/', '\\'];

/// Toolchain configuration for a judged language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    /// Human-readable name for the language (e.g., "C++ (GCC)")
    pub name: String,

    /// Name of the staged source file (e.g., "main.cpp", "Solution.java")
    pub source_name: FileName,

    /// Required class name for class-based languages
    #[serde(default)]
    pub class_name: Option<String>,

    /// Signature used when a problem does not define one for this language
    #[serde(default)]
    pub default_signature: Option<String>,

    /// Compilation step
    pub compile: CompileConfig,

    /// Execution step
    pub run: RunConfig,
}

impl Language {
    /// Class name the harness must use, falling back to "Solution"
    pub fn class_name(&self) -> &str {
        self.class_name.as_deref().unwrap_or("Solution")
    }

    /// Expand placeholders in the given command
    ///
    /// Placeholders: `{source}`, `{binary}`, `{dir}`, `{class}`
    pub fn expand_command(command: &[String], paths: &CommandPaths<'_>) -> Vec<String> {
        command
            .iter()
            .map(|arg| {
                arg.replace("{source}", paths.source)
                    .replace("{binary}", paths.binary)
                    .replace("{dir}", paths.dir)
                    .replace("{class}", paths.class)
            })
            .collect()
    }
}

/// Concrete values substituted into command templates
#[derive(Debug, Clone, Copy)]
pub struct CommandPaths<'a> {
    pub source: &'a str,
    pub binary: &'a str,
    pub dir: &'a str,
    pub class: &'a str,
}

/// Bare file name without any path separators (e.g., "main.cpp")
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileName(String);

impl FileName {
    pub fn new(name: &str) -> Result<Self, ConfigError> {
        let contains_invalid = name.chars().any(|c| INVALID_FILE_NAME_CHARS.contains(&c));
        if contains_invalid || name == "." || name == ".." {
            return Err(ConfigError::InvalidFileName(name.to_owned()));
        }
        Ok(Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for FileName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileName::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file name without path separators",
            )
        })
    }
}

impl std::fmt::Display for FileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for the compilation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Command and arguments with placeholders
    pub command: Vec<String>,

    /// Output artifact name inside the staging directory (e.g., "main")
    #[serde(default = "default_output_name")]
    pub output_name: FileName,

    /// Environment variables to set during compilation
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Configuration for the execution step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Command and arguments with placeholders
    pub command: Vec<String>,

    /// Environment variables to set
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_output_name() -> FileName {
    FileName("main".to_owned())
}
