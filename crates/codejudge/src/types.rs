use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Languages the harness synthesizer knows how to wrap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageId {
    /// C++ (function-style, compiled ahead of time)
    Cpp,

    /// C (function-style, compiled ahead of time)
    C,

    /// Java (class-based, compiled to a fixed class name)
    Java,
}

impl LanguageId {
    pub const ALL: [LanguageId; 3] = [LanguageId::Cpp, LanguageId::C, LanguageId::Java];

    /// Identifier used on the wire and as the config table key
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageId::Cpp => "cpp",
            LanguageId::C => "c",
            LanguageId::Java => "java",
        }
    }

    /// Whether the language binds the program to a required class name
    pub fn is_class_based(&self) -> bool {
        matches!(self, LanguageId::Java)
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported language '{0}'")]
pub struct UnknownLanguage(pub String);

impl FromStr for LanguageId {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cpp" => Ok(LanguageId::Cpp),
            "c" => Ok(LanguageId::C),
            "java" => Ok(LanguageId::Java),
            other => Err(UnknownLanguage(other.to_owned())),
        }
    }
}

/// Result of one sandboxed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Standard output, line endings normalized to `\n`
    pub stdout: String,

    /// Standard error, line endings normalized to `\n`
    pub stderr: String,

    /// Wall clock time of the run step in milliseconds
    pub exec_time_ms: u64,

    /// Peak resident set size in kilobytes.
    /// None when the platform does not expose it or the process exited before
    /// the first sample.
    pub peak_memory_kb: Option<u64>,
}

impl ExecutionResult {
    /// Check if the run wrote anything to stderr
    #[must_use]
    pub fn has_stderr(&self) -> bool {
        !self.stderr.trim().is_empty()
    }
}

/// Final classification of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    RuntimeError,
    TimeLimitExceeded,
    CompilationError,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::WrongAnswer => "wrong_answer",
            Verdict::RuntimeError => "runtime_error",
            Verdict::TimeLimitExceeded => "time_limit_exceeded",
            Verdict::CompilationError => "compilation_error",
        }
    }

    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single test case in preview ("run") mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
    Error,
}

/// Compare program output against the expected rendering.
///
/// Both sides are trimmed once; the actual output additionally loses exactly one
/// trailing comma left over from array printing. Everything else is compared
/// byte for byte.
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    clean_output(actual) == expected.trim()
}

/// Trim program output and drop a single trailing comma
pub fn clean_output(actual: &str) -> &str {
    let trimmed = actual.trim();
    trimmed.strip_suffix(',').unwrap_or(trimmed)
}
