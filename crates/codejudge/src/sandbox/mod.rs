//! Execution sandbox client
//!
//! A [`Sandbox`] takes a language, complete source text and optional stdin,
//! compiles the source and runs it, reporting stdout, stderr and the wall clock
//! time of the run step. [`ProcessSandbox`] does this with local toolchains in
//! per-call staging directories.
//!
//! Isolation is limited to separate directories, wall clock limits and output
//! caps. Programs run with the privileges of the judge process.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use crate::sandbox::pool::WorkerPool;
pub use crate::sandbox::process::ProcessSandbox;
use crate::config::ConfigError;
use crate::staging::StagingError;
use crate::types::{ExecutionResult, LanguageId};

mod memory;
mod pool;
mod process;

/// Errors from a sandbox call
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("compilation failed")]
    Compile { stderr: String },

    #[error("compilation timed out after {0:?}")]
    CompileTimeout(Duration),

    #[error("program terminated abnormally ({status})")]
    Runtime {
        status: String,
        stdout: String,
        stderr: String,
        exec_time_ms: u64,
    },

    #[error("time limit exceeded after {exec_time_ms} ms")]
    TimeLimit { exec_time_ms: u64, stderr: String },

    #[error("request cancelled")]
    Cancelled,

    #[error("all {0} workers are busy")]
    Saturated(usize),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("empty command template for {0}")]
    EmptyCommand(LanguageId),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Language(#[from] ConfigError),
}

impl SandboxError {
    /// Which step of the pipeline the failure belongs to
    pub fn phase(&self) -> Phase {
        match self {
            SandboxError::Compile { .. } | SandboxError::CompileTimeout(_) => Phase::Compile,
            SandboxError::Runtime { .. } => Phase::Run,
            SandboxError::TimeLimit { .. } => Phase::Timeout,
            _ => Phase::Internal,
        }
    }

    /// Diagnostic text captured from the toolchain or program, if any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            SandboxError::Compile { stderr }
            | SandboxError::Runtime { stderr, .. }
            | SandboxError::TimeLimit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Whether the failure lies with the judge rather than the submitted code
    pub fn is_infrastructure(&self) -> bool {
        self.phase() == Phase::Internal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Compile,
    Run,
    Timeout,
    Internal,
}

/// Sandbox request as sent over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxRequest {
    pub language: LanguageId,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    /// Wall clock limit for the run step; the configured default applies when unset
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl SandboxRequest {
    pub fn new(language: LanguageId, code: impl Into<String>) -> Self {
        Self {
            language,
            code: code.into(),
            input: None,
            timeout: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Successful run as sent over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxResponse {
    pub stdout: String,
    pub stderr: String,
    pub exec_time: u64,
}

/// Failed call as sent over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxFailure {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    pub phase: Phase,
}

/// Either wire response shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireResponse {
    Success(SandboxResponse),
    Failure(SandboxFailure),
}

impl From<ExecutionResult> for SandboxResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            stdout: result.stdout,
            stderr: result.stderr,
            exec_time: result.exec_time_ms,
        }
    }
}

impl From<&SandboxError> for SandboxFailure {
    fn from(err: &SandboxError) -> Self {
        Self {
            error: err.to_string(),
            stderr: err.stderr().map(str::to_owned),
            phase: err.phase(),
        }
    }
}

impl From<Result<ExecutionResult, SandboxError>> for WireResponse {
    fn from(result: Result<ExecutionResult, SandboxError>) -> Self {
        match result {
            Ok(result) => WireResponse::Success(result.into()),
            Err(err) => WireResponse::Failure((&err).into()),
        }
    }
}

/// Compile-and-run boundary used by the judge
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Compile without running.
    ///
    /// Returns the compiler's diagnostic output, which is empty for a clean build.
    async fn compile(
        &self,
        request: &SandboxRequest,
        cancel: &CancellationToken,
    ) -> Result<String, SandboxError>;

    /// Compile and run once with the request's stdin
    async fn execute(
        &self,
        request: &SandboxRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, SandboxError>;

    /// Run the same source against several stdin payloads.
    ///
    /// The outer error is a failure before any payload ran (compilation,
    /// staging); per-payload failures are reported in place.
    async fn execute_many(
        &self,
        request: &SandboxRequest,
        inputs: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Result<ExecutionResult, SandboxError>>, SandboxError> {
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            let single = request.clone().with_input(input.clone());
            match self.execute(&single, cancel).await {
                Err(err @ (SandboxError::Compile { .. } | SandboxError::CompileTimeout(_)))
                    if results.is_empty() =>
                {
                    return Err(err);
                }
                Err(SandboxError::Cancelled) => return Err(SandboxError::Cancelled),
                other => results.push(other),
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_shape() {
        let request: SandboxRequest =
            serde_json::from_str(r#"{"language":"cpp","code":"int main(){}","input":"1 2"}"#)
                .unwrap();
        assert_eq!(request.language, LanguageId::Cpp);
        assert_eq!(request.input.as_deref(), Some("1 2"));
        assert_eq!(request.timeout, None);

        let request: SandboxRequest =
            serde_json::from_str(r#"{"language":"java","code":""}"#).unwrap();
        assert_eq!(request.input, None);
    }

    #[test]
    fn success_wire_shape() {
        let response = WireResponse::from(Ok(ExecutionResult {
            stdout: "[0,1]\n".into(),
            stderr: String::new(),
            exec_time_ms: 12,
            peak_memory_kb: Some(2048),
        }));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"stdout": "[0,1]\n", "stderr": "", "execTime": 12})
        );
    }

    #[test]
    fn failure_wire_shape() {
        let response = WireResponse::from(Err(SandboxError::Compile {
            stderr: "main.cpp:3:5: error: oops".into(),
        }));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "error": "compilation failed",
                "stderr": "main.cpp:3:5: error: oops",
                "phase": "compile"
            })
        );

        let json = serde_json::to_value(WireResponse::from(Err(SandboxError::Saturated(4)))).unwrap();
        assert_eq!(json["phase"], "internal");
        assert!(json.get("stderr").is_none());
    }

    #[test]
    fn phases() {
        assert_eq!(
            SandboxError::TimeLimit { exec_time_ms: 1, stderr: String::new() }.phase(),
            Phase::Timeout
        );
        assert_eq!(
            SandboxError::CompileTimeout(Duration::from_secs(10)).phase(),
            Phase::Compile
        );
        assert!(SandboxError::Cancelled.is_infrastructure());
        assert!(
            !SandboxError::Runtime {
                status: "exit status: 1".into(),
                stdout: String::new(),
                stderr: String::new(),
                exec_time_ms: 3,
            }
            .is_infrastructure()
        );
    }
}
