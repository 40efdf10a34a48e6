use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::judge::{CaseOutcome, Judge, JudgeError};
use crate::types::{CaseStatus, LanguageId, clean_output};

/// Result of one public test case in preview mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCaseReport {
    /// 1-based position among the public test cases
    pub index: usize,
    pub input: String,
    pub expected: String,
    pub output: String,
    pub status: CaseStatus,

    /// Classified diagnostics or runtime summary; empty when the case passed
    pub diagnostic_message: String,
    pub diagnostic_lines: Vec<usize>,

    pub exec_time: u64,
}

impl Judge {
    /// Preview `code` against every public test case.
    ///
    /// Each case is compiled and run on its own; a failing case does not stop
    /// the ones after it. Nothing is persisted.
    #[instrument(skip(self, code, cancel))]
    pub async fn run(
        &self,
        problem_id: &str,
        code: &str,
        language: LanguageId,
        cancel: &CancellationToken,
    ) -> Result<Vec<RunCaseReport>, JudgeError> {
        let prepared = self.prepare(problem_id, code, language).await?;
        if prepared.problem.public_test_cases.is_empty() {
            return Err(JudgeError::NoTestCases(prepared.problem.id));
        }

        let mut reports = Vec::with_capacity(prepared.problem.public_test_cases.len());
        for (i, case) in prepared.problem.public_test_cases.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(JudgeError::Cancelled);
            }

            let outcome = self.run_case(&prepared, case, cancel).await;
            let exec_time = outcome.exec_time_ms();
            let (status, output, diagnostic_message, diagnostic_lines) = match outcome {
                CaseOutcome::Passed(result) => (
                    CaseStatus::Passed,
                    clean_output(&result.stdout).to_owned(),
                    String::new(),
                    Vec::new(),
                ),
                CaseOutcome::Mismatch(result) => (
                    CaseStatus::Failed,
                    clean_output(&result.stdout).to_owned(),
                    String::new(),
                    Vec::new(),
                ),
                CaseOutcome::Fault {
                    message, stdout, ..
                } => (
                    CaseStatus::Error,
                    clean_output(&stdout).to_owned(),
                    message,
                    Vec::new(),
                ),
                CaseOutcome::TimedOut { .. } => (
                    CaseStatus::Error,
                    String::new(),
                    "Time limit exceeded".to_owned(),
                    Vec::new(),
                ),
                CaseOutcome::CompileFailed(diagnostics) => (
                    CaseStatus::Error,
                    String::new(),
                    diagnostics.message,
                    diagnostics.lines,
                ),
                CaseOutcome::Infrastructure { message } => {
                    (CaseStatus::Error, String::new(), message, Vec::new())
                }
                CaseOutcome::Cancelled => return Err(JudgeError::Cancelled),
            };

            reports.push(RunCaseReport {
                index: i + 1,
                input: case.input.clone(),
                expected: case.output.trim().to_owned(),
                output,
                status,
                diagnostic_message,
                diagnostic_lines,
                exec_time,
            });
        }

        let passed = reports
            .iter()
            .filter(|r| r.status == CaseStatus::Passed)
            .count();
        info!(passed, total = reports.len(), "run finished");
        Ok(reports)
    }
}
