//! Judge orchestration
//!
//! The [`Judge`] ties the pipeline together. For every test case it normalizes
//! the user's code, synthesizes a harness around it, hands the program to the
//! [`Sandbox`] and classifies what comes back. Two entry points share that
//! machinery:
//!
//! - [`Judge::run`] previews a solution against the public test cases and
//!   reports every case, never stopping early.
//! - [`Judge::submit`] checks that the code compiles, then runs public and
//!   hidden cases in order, stops at the first failure and persists the
//!   resulting [`Submission`](crate::problem::Submission).
//!
//! Failures that are the judge's fault (spawn errors, pool saturation,
//! malformed test input, a missing signature) are reported to the caller as a
//! runtime error and logged at error level.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

pub use crate::judge::run::RunCaseReport;
pub use crate::judge::submit::{FailedCase, SubmitOutcome, SubmitRequest};
use crate::classify::{Diagnostics, classify_diagnostics, summarize_runtime_error};
use crate::config::Config;
use crate::harness::{Harness, HarnessError, HarnessSpec, synthesize};
use crate::normalize::{Normalizer, PatternNormalizer};
use crate::problem::{Problem, ProblemStore, StoreError, SubmissionStore, TestCase};
use crate::sandbox::{Sandbox, SandboxError, SandboxRequest};
use crate::types::{ExecutionResult, LanguageId, outputs_match};

mod run;
mod submit;

/// Request-level failures
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("problem '{0}' not found")]
    ProblemNotFound(String),

    #[error("language '{0}' is not configured")]
    UnsupportedLanguage(LanguageId),

    #[error("problem '{0}' has no test cases")]
    NoTestCases(String),

    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs user code against a problem's test cases
#[derive(Clone)]
pub struct Judge {
    config: Arc<Config>,
    sandbox: Arc<dyn Sandbox>,
    problems: Arc<dyn ProblemStore>,
    submissions: Arc<dyn SubmissionStore>,
    normalizer: Arc<dyn Normalizer>,
}

impl std::fmt::Debug for Judge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Judge").finish_non_exhaustive()
    }
}

impl Judge {
    pub fn new(
        config: Arc<Config>,
        sandbox: Arc<dyn Sandbox>,
        problems: Arc<dyn ProblemStore>,
        submissions: Arc<dyn SubmissionStore>,
    ) -> Self {
        Self {
            config,
            sandbox,
            problems,
            submissions,
            normalizer: Arc::new(PatternNormalizer::new()),
        }
    }

    /// Replace the signature normalizer
    pub fn with_normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Look up the problem and fix everything that stays the same across its
    /// test cases
    async fn prepare(
        &self,
        problem_id: &str,
        code: &str,
        language: LanguageId,
    ) -> Result<Prepared, JudgeError> {
        let problem = self
            .problems
            .problem(problem_id)
            .await?
            .ok_or_else(|| JudgeError::ProblemNotFound(problem_id.to_owned()))?;
        let toolchain = self
            .config
            .get_language(language)
            .map_err(|_| JudgeError::UnsupportedLanguage(language))?;
        if problem.total_test_cases() == 0 {
            return Err(JudgeError::NoTestCases(problem.id));
        }

        let class_name = toolchain.class_name().to_owned();
        let signature = problem
            .signature(language)
            .or(toolchain.default_signature.as_deref())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_owned);

        let code = self.normalizer.normalize(
            language,
            code,
            signature.as_deref().unwrap_or_default(),
            &class_name,
        );
        let spec = match &signature {
            Some(signature) => HarnessSpec::resolve(language, signature, &problem.function_name)
                .map_err(|err| err.to_string()),
            None => Err(format!("no signature available for {language}")),
        };
        debug!(problem = %problem.id, %language, ?spec, "prepared submission");

        Ok(Prepared {
            run_timeout: self.config.run_timeout_for(problem.time_limit_ms),
            problem,
            language,
            class_name,
            code,
            spec,
        })
    }

    /// Run one test case through harness, sandbox and classifier
    async fn run_case(
        &self,
        prepared: &Prepared,
        case: &TestCase,
        cancel: &CancellationToken,
    ) -> CaseOutcome {
        let harness = match prepared.harness(case) {
            Ok(harness) => harness,
            Err(message) => {
                error!(problem = %prepared.problem.id, %message, "cannot build harness");
                return CaseOutcome::Infrastructure { message };
            }
        };
        let language = prepared.language;
        let offset = harness.user_line_offset;
        let request =
            SandboxRequest::new(language, harness.source).with_timeout(prepared.run_timeout);

        match self.sandbox.execute(&request, cancel).await {
            Ok(result) if result.has_stderr() => CaseOutcome::Fault {
                message: summarize_runtime_error(language, &result.stderr, offset),
                stdout: result.stdout,
                exec_time_ms: result.exec_time_ms,
            },
            Ok(result) if outputs_match(&result.stdout, &case.output) => {
                CaseOutcome::Passed(result)
            }
            Ok(result) => CaseOutcome::Mismatch(result),
            Err(SandboxError::Compile { stderr }) => {
                CaseOutcome::CompileFailed(classify_diagnostics(language, &stderr, offset))
            }
            Err(err @ SandboxError::CompileTimeout(_)) => CaseOutcome::CompileFailed(Diagnostics {
                message: err.to_string(),
                lines: Vec::new(),
            }),
            Err(SandboxError::Runtime {
                status,
                stdout,
                stderr,
                exec_time_ms,
            }) => {
                let message = if stderr.trim().is_empty() {
                    format!("Program terminated abnormally ({status})")
                } else {
                    summarize_runtime_error(language, &stderr, offset)
                };
                CaseOutcome::Fault {
                    message,
                    stdout,
                    exec_time_ms,
                }
            }
            Err(SandboxError::TimeLimit { exec_time_ms, .. }) => {
                CaseOutcome::TimedOut { exec_time_ms }
            }
            Err(SandboxError::Cancelled) => CaseOutcome::Cancelled,
            Err(err) => {
                error!(problem = %prepared.problem.id, %language, error = %err, "sandbox failure");
                CaseOutcome::Infrastructure {
                    message: format!("Internal error: {err}"),
                }
            }
        }
    }
}

/// Per-request state shared by every test case
#[derive(Debug)]
struct Prepared {
    problem: Problem,
    language: LanguageId,
    class_name: String,

    /// User code after normalization
    code: String,

    /// Resolved harness spec, or why none could be resolved
    spec: Result<HarnessSpec, String>,

    run_timeout: Duration,
}

impl Prepared {
    fn harness(&self, case: &TestCase) -> Result<Harness, String> {
        let spec = self.spec.as_ref().map_err(Clone::clone)?;
        synthesize(self.language, &self.code, &case.input, spec, &self.class_name)
            .map_err(|err: HarnessError| err.to_string())
    }

    /// Compile-only request for the given case
    fn compile_request(&self, case: &TestCase) -> Result<(SandboxRequest, usize), String> {
        let harness = self.harness(case)?;
        let offset = harness.user_line_offset;
        Ok((SandboxRequest::new(self.language, harness.source), offset))
    }
}

/// What happened to one test case
#[derive(Debug)]
enum CaseOutcome {
    Passed(ExecutionResult),
    Mismatch(ExecutionResult),
    Fault {
        message: String,
        stdout: String,
        exec_time_ms: u64,
    },
    TimedOut {
        exec_time_ms: u64,
    },
    CompileFailed(Diagnostics),
    Infrastructure {
        message: String,
    },
    Cancelled,
}

impl CaseOutcome {
    fn exec_time_ms(&self) -> u64 {
        match self {
            CaseOutcome::Passed(result) | CaseOutcome::Mismatch(result) => result.exec_time_ms,
            CaseOutcome::Fault { exec_time_ms, .. } | CaseOutcome::TimedOut { exec_time_ms } => {
                *exec_time_ms
            }
            _ => 0,
        }
    }
}
