use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{CommandPaths, CompileConfig, FileName, Language, RunConfig};
use crate::types::LanguageId;

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../codejudge.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid file name '{0}': path separators are not allowed")]
    InvalidFileName(String),

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for codejudge
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory under which every sandbox call gets its own staging directory
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,

    /// Seconds staged sources and artifacts are kept before deletion
    #[serde(default = "default_cleanup_grace_secs")]
    pub cleanup_grace_secs: u64,

    /// Maximum concurrent toolchain invocations (defaults to available parallelism)
    #[serde(default)]
    pub max_concurrent: Option<usize>,

    /// How long a sandbox call may wait for a worker slot.
    /// Zero rejects immediately when every slot is busy.
    #[serde(default = "default_queue_timeout_ms")]
    pub queue_timeout_ms: u64,

    /// Hard limit for a single compile step
    #[serde(default = "default_compile_timeout_secs")]
    pub compile_timeout_secs: u64,

    /// Extra wall time granted on top of a problem's time limit before the
    /// run step is killed (absorbs runtime start-up such as the JVM)
    #[serde(default = "default_run_grace_ms")]
    pub run_grace_ms: u64,

    /// Run step limit used when the caller supplies none
    #[serde(default = "default_run_timeout_ms")]
    pub default_run_timeout_ms: u64,

    /// Maximum captured size of stdout and of stderr, in kilobytes
    #[serde(default = "default_max_output_kb")]
    pub max_output_kb: u64,

    /// Interval between peak-memory samples of a running program
    #[serde(default = "default_memory_sample_interval_ms")]
    pub memory_sample_interval_ms: u64,

    /// Language toolchains keyed by language ID ("cpp", "c", "java")
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

impl Config {
    /// Create a new config with the embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            staging_root: default_staging_root(),
            cleanup_grace_secs: default_cleanup_grace_secs(),
            max_concurrent: None,
            queue_timeout_ms: default_queue_timeout_ms(),
            compile_timeout_secs: default_compile_timeout_secs(),
            run_grace_ms: default_run_grace_ms(),
            default_run_timeout_ms: default_run_timeout_ms(),
            max_output_kb: default_max_output_kb(),
            memory_sample_interval_ms: default_memory_sample_interval_ms(),
            languages: HashMap::new(),
        }
    }

    /// Get a language toolchain by ID
    pub fn get_language(&self, id: LanguageId) -> Result<&Language, ConfigError> {
        self.languages
            .get(id.as_str())
            .ok_or_else(|| ConfigError::LanguageNotFound(id.to_string()))
    }

    /// Number of toolchain invocations allowed to run at once
    pub fn worker_count(&self) -> usize {
        self.max_concurrent
            .filter(|n| *n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_secs(self.cleanup_grace_secs)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    pub fn default_run_timeout(&self) -> Duration {
        Duration::from_millis(self.default_run_timeout_ms)
    }

    /// Hard kill deadline for a run step of a problem with the given time limit
    pub fn run_timeout_for(&self, time_limit_ms: u64) -> Duration {
        Duration::from_millis(time_limit_ms.saturating_add(self.run_grace_ms))
    }

    /// Output cap in bytes
    pub fn max_output_bytes(&self) -> u64 {
        self.max_output_kb.saturating_mul(1024)
    }

    pub fn memory_sample_interval(&self) -> Duration {
        Duration::from_millis(self.memory_sample_interval_ms.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_staging_root() -> PathBuf {
    std::env::temp_dir().join("codejudge")
}

fn default_cleanup_grace_secs() -> u64 {
    20
}

fn default_queue_timeout_ms() -> u64 {
    5_000
}

fn default_compile_timeout_secs() -> u64 {
    10
}

fn default_run_grace_ms() -> u64 {
    1_000
}

fn default_run_timeout_ms() -> u64 {
    10_000
}

fn default_max_output_kb() -> u64 {
    65_536
}

fn default_memory_sample_interval_ms() -> u64 {
    5
}
