//! End-to-end judging with real g++, gcc and javac/java

use std::sync::Arc;

use codejudge::config::Config;
use codejudge::problem::MemoryStore;
use codejudge::sandbox::{Sandbox, SandboxRequest};
use codejudge::types::{CaseStatus, LanguageId, Verdict};
use codejudge::{Judge, SubmitRequest};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use super::{fixture, fixture_problem, process_sandbox, store_with};

struct Toolchain {
    _root: TempDir,
    judge: Judge,
    store: Arc<MemoryStore>,
}

async fn toolchain(problem: &str) -> Toolchain {
    let root = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.staging_root = root.path().to_path_buf();
    config.cleanup_grace_secs = 0;
    let config = Arc::new(config);

    let (sandbox, _queue) = process_sandbox((*config).clone());
    let store = store_with(fixture_problem(problem)).await;
    let judge = Judge::new(config, Arc::new(sandbox), store.clone(), store.clone());
    Toolchain {
        _root: root,
        judge,
        store,
    }
}

async fn submit(toolchain: &Toolchain, problem: &str, language: LanguageId, source: &str) -> codejudge::SubmitOutcome {
    let request = SubmitRequest {
        user_id: "ci".into(),
        problem_id: problem.into(),
        code: fixture(&format!("sources/{source}")),
        language,
    };
    toolchain
        .judge
        .submit(&request, &CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_cpp_two_sum_accepted() {
    let t = toolchain("two_sum").await;
    let outcome = submit(&t, "two-sum", LanguageId::Cpp, "two_sum.cpp").await;
    assert_eq!(outcome.status, Verdict::Accepted, "{outcome:?}");
    assert_eq!(outcome.test_cases_passed, 5);
    assert_eq!(t.store.submissions().await.len(), 1);
}

#[tokio::test]
async fn test_cpp_two_sum_wrong_answer() {
    let t = toolchain("two_sum").await;
    let outcome = submit(&t, "two-sum", LanguageId::Cpp, "two_sum_swapped.cpp").await;
    assert_eq!(outcome.status, Verdict::WrongAnswer, "{outcome:?}");
    assert_eq!(outcome.failed_case.unwrap().output, "[1,0]");
}

#[tokio::test]
async fn test_cpp_syntax_error_points_at_user_line() {
    let t = toolchain("two_sum").await;
    let outcome = submit(&t, "two-sum", LanguageId::Cpp, "syntax_error.cpp").await;
    assert_eq!(outcome.status, Verdict::CompilationError);
    let message = outcome.error_message.unwrap();
    assert!(
        message.starts_with("Line 2: error:") || message.starts_with("Line 3: error:"),
        "{message}"
    );
    assert!(t.store.submissions().await.is_empty());
}

#[tokio::test]
async fn test_cpp_fault_on_second_case() {
    let t = toolchain("two_sum").await;
    let outcome = submit(&t, "two-sum", LanguageId::Cpp, "out_of_range.cpp").await;
    assert_eq!(outcome.status, Verdict::RuntimeError, "{outcome:?}");
    assert_eq!(outcome.test_cases_passed, 1);
}

#[tokio::test]
async fn test_c_two_sum_accepted() {
    let t = toolchain("two_sum").await;
    let outcome = submit(&t, "two-sum", LanguageId::C, "two_sum.c").await;
    assert_eq!(outcome.status, Verdict::Accepted, "{outcome:?}");
}

#[tokio::test]
async fn test_java_two_sum_accepted() {
    let t = toolchain("two_sum").await;
    let outcome = submit(&t, "two-sum", LanguageId::Java, "two_sum.java").await;
    assert_eq!(outcome.status, Verdict::Accepted, "{outcome:?}");
}

#[tokio::test]
async fn test_java_bare_method_with_own_imports_accepted() {
    let t = toolchain("two_sum").await;
    let outcome = submit(&t, "two-sum", LanguageId::Java, "two_sum_imports.java").await;
    assert_eq!(outcome.status, Verdict::Accepted, "{outcome:?}");
    assert_eq!(outcome.test_cases_passed, 5);
}

#[tokio::test]
async fn test_java_exception_line() {
    let t = toolchain("two_sum").await;
    let outcome = submit(&t, "two-sum", LanguageId::Java, "divide_by_zero.java").await;
    assert_eq!(outcome.status, Verdict::RuntimeError);
    assert!(
        outcome
            .error_message
            .unwrap()
            .ends_with("java.lang.ArithmeticException: / by zero (line 3)")
    );
}

#[tokio::test]
async fn test_cpp_run_mode() {
    let t = toolchain("is_palindrome").await;
    let code = fixture("sources/is_palindrome.cpp");
    let reports = t
        .judge
        .run("is-palindrome", &code, LanguageId::Cpp, &CancellationToken::new())
        .await
        .unwrap();
    assert!(reports.iter().all(|r| r.status == CaseStatus::Passed), "{reports:?}");
}

#[tokio::test]
async fn test_raw_sandbox_request() {
    let root = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.staging_root = root.path().to_path_buf();
    let (sandbox, _queue) = process_sandbox(config);

    let request = SandboxRequest::new(
        LanguageId::Cpp,
        "#include <iostream>\nint main(){int a,b;std::cin>>a>>b;std::cout<<a+b;}",
    )
    .with_input("2 3");
    let result = sandbox.execute(&request, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.stdout, "5");
}
