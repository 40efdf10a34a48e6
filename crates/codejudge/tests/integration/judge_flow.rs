//! Judge scenarios over the fixture problems with a sandbox that answers by
//! looking at the synthesized program

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use codejudge::config::Config;
use codejudge::problem::ProblemStore;
use codejudge::sandbox::{Sandbox, SandboxError, SandboxRequest};
use codejudge::types::{CaseStatus, ExecutionResult, LanguageId, Verdict};
use codejudge::{Judge, SubmitRequest};
use tokio_util::sync::CancellationToken;

use super::{fixture, fixture_problem, store_with};

/// Replies to the first rule whose needle occurs in the program
#[derive(Default)]
struct OracleSandbox {
    diagnostics: Option<Result<String, String>>,
    rules: Vec<(&'static str, Result<ExecutionResult, SandboxError>)>,
    programs: Mutex<Vec<String>>,
}

impl OracleSandbox {
    fn on(mut self, needle: &'static str, stdout: &str) -> Self {
        self.rules.push((
            needle,
            Ok(ExecutionResult {
                stdout: stdout.to_owned(),
                exec_time_ms: 5,
                peak_memory_kb: Some(900),
                ..ExecutionResult::default()
            }),
        ));
        self
    }

    fn on_result(mut self, needle: &'static str, result: Result<ExecutionResult, SandboxError>) -> Self {
        self.rules.push((needle, result));
        self
    }

    fn compile_error(mut self, stderr: &str) -> Self {
        self.diagnostics = Some(Err(stderr.to_owned()));
        self
    }

    fn programs(&self) -> Vec<String> {
        self.programs.lock().unwrap().clone()
    }
}

fn replay(result: &Result<ExecutionResult, SandboxError>) -> Result<ExecutionResult, SandboxError> {
    match result {
        Ok(r) => Ok(r.clone()),
        Err(SandboxError::Runtime {
            status,
            stdout,
            stderr,
            exec_time_ms,
        }) => Err(SandboxError::Runtime {
            status: status.clone(),
            stdout: stdout.clone(),
            stderr: stderr.clone(),
            exec_time_ms: *exec_time_ms,
        }),
        Err(SandboxError::TimeLimit {
            exec_time_ms,
            stderr,
        }) => Err(SandboxError::TimeLimit {
            exec_time_ms: *exec_time_ms,
            stderr: stderr.clone(),
        }),
        Err(other) => panic!("cannot replay {other:?}"),
    }
}

#[async_trait]
impl Sandbox for OracleSandbox {
    async fn compile(
        &self,
        request: &SandboxRequest,
        _cancel: &CancellationToken,
    ) -> Result<String, SandboxError> {
        self.programs.lock().unwrap().push(request.code.clone());
        match &self.diagnostics {
            Some(Err(stderr)) => Err(SandboxError::Compile {
                stderr: stderr.clone(),
            }),
            Some(Ok(warnings)) => Ok(warnings.clone()),
            None => Ok(String::new()),
        }
    }

    async fn execute(
        &self,
        request: &SandboxRequest,
        _cancel: &CancellationToken,
    ) -> Result<ExecutionResult, SandboxError> {
        self.programs.lock().unwrap().push(request.code.clone());
        let (_, result) = self
            .rules
            .iter()
            .find(|(needle, _)| request.code.contains(needle))
            .unwrap_or_else(|| panic!("no rule for program:\n{}", request.code));
        replay(result)
    }
}

fn two_sum_oracle(first: &str) -> OracleSandbox {
    OracleSandbox::default()
        .on("{2, 7, 11, 15}", first)
        .on("{3, 2, 4}", "[1,2]\n")
        .on("{3, 3}", "[0,1]\n")
        .on("{1, 5, 9}", "[1,2]\n")
        .on("{0, 4, 3, 0}", "[0,3]\n")
}

async fn judge_for(problem: &str, sandbox: Arc<OracleSandbox>) -> (Judge, Arc<codejudge::MemoryStore>) {
    let store = store_with(fixture_problem(problem)).await;
    let judge = Judge::new(
        Arc::new(Config::default()),
        sandbox,
        store.clone(),
        store.clone(),
    );
    (judge, store)
}

fn submit_request(problem: &str, language: LanguageId, source: &str) -> SubmitRequest {
    SubmitRequest {
        user_id: "alice".into(),
        problem_id: problem.into(),
        code: fixture(&format!("sources/{source}")),
        language,
    }
}

#[tokio::test]
async fn test_two_sum_accepted() {
    let sandbox = Arc::new(two_sum_oracle("[0,1]\n"));
    let (judge, store) = judge_for("two_sum", sandbox.clone()).await;
    let request = submit_request("two-sum", LanguageId::Cpp, "two_sum.cpp");

    let outcome = judge.submit(&request, &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.status, Verdict::Accepted);
    assert_eq!(outcome.test_cases_passed, 5);
    assert_eq!(outcome.total_test_cases, 5);
    assert_eq!(outcome.success_rate, 100);
    assert_eq!(outcome.execution_time, 25);
    assert_eq!(outcome.memory_used, Some(900));

    let programs = sandbox.programs();
    assert_eq!(programs.len(), 6);
    for program in &programs {
        assert!(program.starts_with("#include <iostream>\n"));
        assert!(program.contains("vector<int> solution(vector<int>& nums, int target) {"));
        assert!(program.contains("auto result = solution(nums, target);"));
    }

    let stored = store.submissions().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].code, request.code);
    assert_eq!(stored[0].user_id, "alice");

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "accepted");
    assert_eq!(json["testCasesPassed"], 5);
    assert!(json["submissionId"].is_string());
}

#[tokio::test]
async fn test_two_sum_swapped_indices() {
    let sandbox = Arc::new(two_sum_oracle("[1,0]\n"));
    let (judge, store) = judge_for("two_sum", sandbox).await;
    let request = submit_request("two-sum", LanguageId::Cpp, "two_sum_swapped.cpp");

    let outcome = judge.submit(&request, &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.status, Verdict::WrongAnswer);
    assert_eq!(outcome.test_cases_passed, 0);
    let failed = outcome.failed_case.expect("failed case");
    assert_eq!(failed.index, 1);
    assert_eq!(failed.input, "nums = [2,7,11,15], target = 9");
    assert_eq!(failed.output, "[1,0]");

    let problem = store.problem("two-sum").await.unwrap().unwrap();
    assert_eq!((problem.submission_count, problem.success_count), (1, 0));
}

#[tokio::test]
async fn test_syntax_error_stores_nothing() {
    let sandbox = Arc::new(OracleSandbox::default().compile_error(
        "/tmp/codejudge/cpp_x/main.cpp: In function 'std::vector<int> solution(std::vector<int>&, int)':\n\
         /tmp/codejudge/cpp_x/main.cpp:16:17: error: expected ',' or ';' before 'return'\n",
    ));
    let (judge, store) = judge_for("two_sum", sandbox.clone()).await;
    let request = submit_request("two-sum", LanguageId::Cpp, "syntax_error.cpp");

    let outcome = judge.submit(&request, &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.status, Verdict::CompilationError);
    assert_eq!(outcome.submission_id, None);
    assert_eq!(
        outcome.error_message.as_deref(),
        Some("Line 2: error: expected ',' or ';' before 'return'")
    );
    assert_eq!(sandbox.programs().len(), 1);
    assert!(store.submissions().await.is_empty());
}

#[tokio::test]
async fn test_fault_on_second_case() {
    let sandbox = Arc::new(
        OracleSandbox::default()
            .on("{2, 7, 11, 15}", "[0,1]")
            .on_result(
                "{3, 2, 4}",
                Err(SandboxError::Runtime {
                    status: "signal: 6 (SIGABRT)".into(),
                    stdout: String::new(),
                    stderr: "terminate called after throwing an instance of 'std::out_of_range'\n".into(),
                    exec_time_ms: 3,
                }),
            ),
    );
    let (judge, store) = judge_for("two_sum", sandbox).await;
    let request = submit_request("two-sum", LanguageId::Cpp, "out_of_range.cpp");

    let outcome = judge.submit(&request, &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.status, Verdict::RuntimeError);
    assert_eq!(outcome.test_cases_passed, 1);
    assert!(outcome.error_message.unwrap().contains("std::out_of_range"));
    assert_eq!(store.submissions().await[0].test_cases_passed, 1);
}

#[tokio::test]
async fn test_time_limit_on_third_of_five() {
    // first matching rule wins, so the timeout goes ahead of the answers
    let sandbox = Arc::new(
        OracleSandbox::default()
            .on_result(
                "{3, 3}",
                Err(SandboxError::TimeLimit {
                    exec_time_ms: 3000,
                    stderr: String::new(),
                }),
            )
            .on("{2, 7, 11, 15}", "[0,1]")
            .on("{3, 2, 4}", "[1,2]"),
    );

    let (judge, _) = judge_for("two_sum", sandbox).await;
    let request = submit_request("two-sum", LanguageId::Cpp, "two_sum.cpp");
    let outcome = judge.submit(&request, &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.status, Verdict::TimeLimitExceeded);
    assert_eq!(outcome.test_cases_passed, 2);
    assert_eq!(outcome.total_test_cases, 5);
    assert_eq!(outcome.execution_time, 3010);
}

#[tokio::test]
async fn test_run_reports_public_cases_only() {
    let sandbox = Arc::new(two_sum_oracle("[1,0]"));
    let (judge, store) = judge_for("two_sum", sandbox.clone()).await;
    let code = fixture("sources/two_sum_swapped.cpp");

    let reports = judge
        .run("two-sum", &code, LanguageId::Cpp, &CancellationToken::new())
        .await
        .unwrap();

    let statuses: Vec<_> = reports.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![CaseStatus::Failed, CaseStatus::Passed]);
    assert_eq!(sandbox.programs().len(), 2);
    assert!(store.submissions().await.is_empty());
}

#[tokio::test]
async fn test_java_class_is_renamed_and_imports_added() {
    let sandbox = Arc::new(two_sum_oracle("[0,1]"));
    let (judge, _) = judge_for("two_sum", sandbox.clone()).await;
    let code = fixture("sources/two_sum.java");

    let reports = judge
        .run("two-sum", &code, LanguageId::Java, &CancellationToken::new())
        .await
        .unwrap();
    assert!(reports.iter().all(|r| r.status == CaseStatus::Passed));

    let program = &sandbox.programs()[0];
    assert!(program.starts_with("import java.util.*;\n"));
    assert!(program.contains("class Solution {"));
    assert!(!program.contains("Answer"));
    assert!(program.contains("public int[] solution(int[] nums, int target) {"));
    assert!(program.contains("Solution solver = new Solution();"));
}

#[tokio::test]
async fn test_java_exception_is_summarized() {
    let trace = "Exception in thread \"main\" java.lang.ArithmeticException: / by zero\n\
                 \tat Solution.solution(Solution.java:4)\n\
                 \tat Solution.main(Solution.java:12)\n";
    let sandbox = Arc::new(OracleSandbox::default().on_result(
        "{2, 7, 11, 15}",
        Err(SandboxError::Runtime {
            status: "exit status: 1".into(),
            stdout: String::new(),
            stderr: trace.into(),
            exec_time_ms: 40,
        }),
    ));
    let (judge, _) = judge_for("two_sum", sandbox).await;
    let request = submit_request("two-sum", LanguageId::Java, "divide_by_zero.java");

    let outcome = judge.submit(&request, &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.status, Verdict::RuntimeError);
    assert_eq!(
        outcome.error_message.as_deref(),
        Some(
            "Runtime error on test case 1: Runtime exception: java.lang.ArithmeticException: / by zero (line 3)"
        )
    );
}

#[tokio::test]
async fn test_bool_and_string_problem() {
    let sandbox = Arc::new(
        OracleSandbox::default()
            .on("\"racecar\"", "true\n")
            .on("\"judge\"", "false\n")
            .on("s = \"\"", "true\n"),
    );
    let (judge, _) = judge_for("is_palindrome", sandbox.clone()).await;
    let request = submit_request("is-palindrome", LanguageId::Cpp, "is_palindrome.cpp");

    let outcome = judge.submit(&request, &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.status, Verdict::Accepted);
    assert_eq!(outcome.total_test_cases, 3);

    let program = &sandbox.programs()[0];
    assert!(program.contains("bool isPalindrome(string s) {"));
    assert!(program.contains("string s = \"racecar\";"));
}
