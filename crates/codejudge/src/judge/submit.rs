use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::classify::{Diagnostics, classify_diagnostics};
use crate::judge::{CaseOutcome, Judge, JudgeError, Prepared};
use crate::problem::{Submission, truncate_error_message, unix_millis};
use crate::sandbox::SandboxError;
use crate::types::{LanguageId, Verdict, clean_output};

/// A graded submission attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub user_id: String,
    pub problem_id: String,
    pub code: String,
    pub language: LanguageId,
}

/// The first test case that produced the wrong answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCase {
    /// 1-based position over public then hidden cases
    pub index: usize,
    pub input: String,
    pub expected: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    /// Absent when compilation failed and nothing was stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<Uuid>,
    pub status: Verdict,
    pub execution_time: u64,
    pub memory_used: Option<u64>,
    pub test_cases_passed: usize,
    pub total_test_cases: usize,

    /// Percentage of test cases passed, rounded
    pub success_rate: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_case: Option<FailedCase>,
}

pub(crate) fn success_rate(passed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let rate = (passed as f64 * 100.0 / total as f64).round();
    rate.clamp(0.0, 100.0) as u32
}

/// Running totals while the cases of one submission execute
#[derive(Debug)]
struct Tally {
    status: Verdict,
    passed: usize,
    total_time_ms: u64,
    peak_memory_kb: Option<u64>,
    error_message: Option<String>,
    failed_case: Option<FailedCase>,
}

impl Tally {
    fn new() -> Self {
        Self {
            status: Verdict::Accepted,
            passed: 0,
            total_time_ms: 0,
            peak_memory_kb: None,
            error_message: None,
            failed_case: None,
        }
    }

    fn fail(&mut self, status: Verdict, message: String) {
        self.status = status;
        self.error_message = Some(message);
    }
}

enum CompileCheck {
    Clean,
    Failed(Diagnostics),
    Internal(String),
}

impl Judge {
    /// Grade `request.code` against every test case of the problem.
    ///
    /// A compile check on the first test case runs before anything else; when
    /// it reports errors or warnings the outcome is `compilation_error` and no
    /// submission is stored. Otherwise public and hidden cases run in order
    /// until the first failure, and the result is stored together with the
    /// problem's attempt counters.
    #[instrument(
        skip(self, request, cancel),
        fields(user = %request.user_id, problem = %request.problem_id, language = %request.language)
    )]
    pub async fn submit(
        &self,
        request: &SubmitRequest,
        cancel: &CancellationToken,
    ) -> Result<SubmitOutcome, JudgeError> {
        let prepared = self
            .prepare(&request.problem_id, &request.code, request.language)
            .await?;
        let total = prepared.problem.total_test_cases();

        let mut tally = Tally::new();
        match self.compile_check(&prepared, cancel).await? {
            CompileCheck::Clean => self.run_cases(&prepared, &mut tally, cancel).await?,
            CompileCheck::Failed(diagnostics) => {
                info!(lines = ?diagnostics.lines, "compilation failed");
                return Ok(SubmitOutcome {
                    submission_id: None,
                    status: Verdict::CompilationError,
                    execution_time: 0,
                    memory_used: None,
                    test_cases_passed: 0,
                    total_test_cases: total,
                    success_rate: 0,
                    error_message: Some(truncate_error_message(&diagnostics.message)),
                    failed_case: None,
                });
            }
            CompileCheck::Internal(message) => tally.fail(Verdict::RuntimeError, message),
        }

        if cancel.is_cancelled() {
            return Err(JudgeError::Cancelled);
        }

        let submission = Submission {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            problem_id: prepared.problem.id.clone(),
            code: request.code.clone(),
            language: request.language,
            status: tally.status,
            execution_time_ms: tally.total_time_ms,
            memory_used_kb: tally.peak_memory_kb,
            test_cases_passed: tally.passed,
            total_test_cases: total,
            error_message: tally.error_message.as_deref().map(truncate_error_message),
            created_at_ms: unix_millis(),
        };
        let submission = self.submissions.create(submission).await?;
        self.problems
            .record_attempt(&prepared.problem.id, tally.status.is_accepted())
            .await?;

        info!(
            id = %submission.id,
            status = %submission.status,
            passed = submission.test_cases_passed,
            total,
            time_ms = submission.execution_time_ms,
            "submission judged"
        );

        Ok(SubmitOutcome {
            submission_id: Some(submission.id),
            status: submission.status,
            execution_time: submission.execution_time_ms,
            memory_used: submission.memory_used_kb,
            test_cases_passed: submission.test_cases_passed,
            total_test_cases: total,
            success_rate: success_rate(submission.test_cases_passed, total),
            error_message: submission.error_message,
            failed_case: tally.failed_case,
        })
    }

    /// Compile the program built for the first test case without running it
    async fn compile_check(
        &self,
        prepared: &Prepared,
        cancel: &CancellationToken,
    ) -> Result<CompileCheck, JudgeError> {
        let Some(first) = prepared.problem.all_test_cases().next() else {
            return Err(JudgeError::NoTestCases(prepared.problem.id.clone()));
        };
        let (request, offset) = match prepared.compile_request(first) {
            Ok(built) => built,
            Err(message) => {
                error!(problem = %prepared.problem.id, %message, "cannot build harness");
                return Ok(CompileCheck::Internal(message));
            }
        };

        match self.sandbox.compile(&request, cancel).await {
            Ok(diagnostics) if diagnostics.trim().is_empty() => Ok(CompileCheck::Clean),
            Ok(diagnostics) => {
                warn!("compiler reported diagnostics on a successful build");
                Ok(CompileCheck::Failed(classify_diagnostics(
                    prepared.language,
                    &diagnostics,
                    offset,
                )))
            }
            Err(SandboxError::Compile { stderr }) => Ok(CompileCheck::Failed(
                classify_diagnostics(prepared.language, &stderr, offset),
            )),
            Err(err @ SandboxError::CompileTimeout(_)) => Ok(CompileCheck::Failed(Diagnostics {
                message: err.to_string(),
                lines: Vec::new(),
            })),
            Err(SandboxError::Cancelled) => Err(JudgeError::Cancelled),
            Err(err) => {
                error!(problem = %prepared.problem.id, error = %err, "sandbox failure during compile check");
                Ok(CompileCheck::Internal(format!("Internal error: {err}")))
            }
        }
    }

    /// Run public then hidden cases until the first failure
    async fn run_cases(
        &self,
        prepared: &Prepared,
        tally: &mut Tally,
        cancel: &CancellationToken,
    ) -> Result<(), JudgeError> {
        let time_limit = prepared.problem.time_limit_ms;

        for (i, case) in prepared.problem.all_test_cases().enumerate() {
            if cancel.is_cancelled() {
                return Err(JudgeError::Cancelled);
            }
            let number = i + 1;

            let outcome = self.run_case(prepared, case, cancel).await;
            tally.total_time_ms = tally.total_time_ms.saturating_add(outcome.exec_time_ms());

            match outcome {
                CaseOutcome::Passed(result) => {
                    tally.passed += 1;
                    if let Some(kb) = result.peak_memory_kb {
                        tally.peak_memory_kb = Some(tally.peak_memory_kb.map_or(kb, |m| m.max(kb)));
                    }
                    if tally.total_time_ms > time_limit {
                        tally.fail(
                            Verdict::TimeLimitExceeded,
                            format!(
                                "Time limit exceeded: {} ms used of {time_limit} ms after test case {number}",
                                tally.total_time_ms
                            ),
                        );
                        return Ok(());
                    }
                }
                CaseOutcome::Mismatch(result) => {
                    let output = clean_output(&result.stdout).to_owned();
                    tally.fail(
                        Verdict::WrongAnswer,
                        format!("Wrong answer on test case {number}"),
                    );
                    tally.failed_case = Some(FailedCase {
                        index: number,
                        input: case.input.clone(),
                        expected: case.output.trim().to_owned(),
                        output,
                    });
                    return Ok(());
                }
                CaseOutcome::Fault { message, .. } => {
                    tally.fail(
                        Verdict::RuntimeError,
                        format!("Runtime error on test case {number}: {message}"),
                    );
                    return Ok(());
                }
                CaseOutcome::TimedOut { .. } => {
                    tally.fail(
                        Verdict::TimeLimitExceeded,
                        format!("Time limit exceeded on test case {number}"),
                    );
                    return Ok(());
                }
                CaseOutcome::CompileFailed(diagnostics) => {
                    error!(number, "compilation failed after a clean compile check");
                    tally.fail(
                        Verdict::RuntimeError,
                        format!(
                            "Compilation failed on test case {number}: {}",
                            diagnostics.message
                        ),
                    );
                    return Ok(());
                }
                CaseOutcome::Infrastructure { message } => {
                    tally.fail(Verdict::RuntimeError, message);
                    return Ok(());
                }
                CaseOutcome::Cancelled => return Err(JudgeError::Cancelled),
            }
        }
        Ok(())
    }
}
