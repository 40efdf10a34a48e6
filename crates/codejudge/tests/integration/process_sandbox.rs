use std::collections::HashSet;
use std::time::{Duration, Instant};

use codejudge::sandbox::{Phase, Sandbox, SandboxError, SandboxRequest};
use codejudge::types::LanguageId;
use tempfile::TempDir;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::{process_sandbox, sh_config};

const COPY: &[&str] = &["cp", "{source}", "{binary}"];

fn script(code: &str) -> SandboxRequest {
    SandboxRequest::new(LanguageId::C, code)
}

fn setup(extra: &str) -> (TempDir, codejudge::ProcessSandbox, codejudge::CleanupQueue) {
    let root = tempfile::tempdir().unwrap();
    let (sandbox, queue) = process_sandbox(sh_config(root.path(), COPY, extra));
    (root, sandbox, queue)
}

#[tokio::test]
async fn test_stdin_reaches_program() {
    let (_root, sandbox, _queue) = setup("");
    let result = sandbox
        .execute(&script("cat").with_input("1 2\n3\n"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.stdout, "1 2\n3\n");
    assert_eq!(result.stderr, "");
    assert!(result.exec_time_ms < 2000);
}

#[tokio::test]
async fn test_nonzero_exit_is_runtime_error() {
    let (_root, sandbox, _queue) = setup("");
    let err = sandbox
        .execute(
            &script("echo partial; echo boom >&2; exit 3"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        SandboxError::Runtime {
            status,
            stdout,
            stderr,
            ..
        } => {
            assert!(status.contains('3'), "unexpected status {status}");
            assert_eq!(stdout, "partial\n");
            assert_eq!(stderr, "boom\n");
        }
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_run_timeout_kills_program() {
    let (_root, sandbox, _queue) = setup("");
    let started = Instant::now();
    let err = sandbox
        .execute(
            &script("exec sleep 5").with_timeout(Duration::from_millis(100)),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::Timeout);
    assert!(matches!(err, SandboxError::TimeLimit { exec_time_ms, .. } if exec_time_ms >= 100));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_compile_failure_skips_run() {
    let root = tempfile::tempdir().unwrap();
    let compile = ["sh", "-c", "cat \"$0\" >&2; exit 1", "{source}"];
    let (sandbox, _queue) = process_sandbox(sh_config(root.path(), &compile, ""));

    let err = sandbox
        .execute(&script("main.c:4:2: error: nope"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::Compile);
    assert_eq!(err.stderr(), Some("main.c:4:2: error: nope"));
}

#[tokio::test]
async fn test_compile_timeout() {
    let root = tempfile::tempdir().unwrap();
    let (sandbox, _queue) = process_sandbox(sh_config(root.path(), &["sleep", "5"], ""));

    let err = sandbox
        .compile(&script("true"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::CompileTimeout(d) if d == Duration::from_secs(1)));
}

#[tokio::test]
async fn test_compile_reports_diagnostics_on_success() {
    let root = tempfile::tempdir().unwrap();
    let compile = ["sh", "-c", "echo 'main.c:1:1: warning: odd' >&2; cp \"$0\" \"$1\"", "{source}", "{binary}"];
    let (sandbox, _queue) = process_sandbox(sh_config(root.path(), &compile, ""));

    let diagnostics = sandbox
        .compile(&script("true"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(diagnostics, "main.c:1:1: warning: odd\n");
}

#[tokio::test]
async fn test_line_endings_are_normalized() {
    let (_root, sandbox, _queue) = setup("");
    let result = sandbox
        .execute(&script("printf 'a\\r\\nb\\r\\n'\r\nprintf 'c\\r' >&2\r\n"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.stdout, "a\nb\n");
    assert_eq!(result.stderr, "c\n");
}

#[tokio::test]
async fn test_cancellation_kills_program() {
    let (_root, sandbox, _queue) = setup("");
    let cancel = CancellationToken::new();

    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { sandbox.execute(&script("exec sleep 5"), &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    let started = Instant::now();
    cancel.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, SandboxError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_saturated_pool_rejects() {
    let (_root, sandbox, _queue) = setup("max_concurrent = 1\nqueue_timeout_ms = 0");
    let _held = sandbox.pool().acquire().await.unwrap();

    let err = sandbox
        .execute(&script("true"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::Saturated(1)));
    assert!(err.is_infrastructure());
}

#[tokio::test]
async fn test_execute_many_compiles_once() {
    let root = tempfile::tempdir().unwrap();
    let counter = root.path().join("compiles.log");
    let counter = counter.to_str().unwrap();
    let compile = [
        "sh",
        "-c",
        "cp \"$0\" \"$1\" && echo built >> \"$2\"",
        "{source}",
        "{binary}",
        counter,
    ];
    let (sandbox, _queue) = process_sandbox(sh_config(root.path(), &compile, ""));

    let inputs = vec!["a".to_owned(), "b".to_owned(), "c".to_owned()];
    let results = sandbox
        .execute_many(&script("cat; echo"), &inputs, &CancellationToken::new())
        .await
        .unwrap();

    let outputs: Vec<_> = results
        .into_iter()
        .map(|r| r.unwrap().stdout)
        .collect();
    assert_eq!(outputs, vec!["a\n", "b\n", "c\n"]);
    assert_eq!(std::fs::read_to_string(counter).unwrap(), "built\n");
}

#[tokio::test]
async fn test_concurrent_calls_get_distinct_directories() {
    let (_root, sandbox, _queue) = setup("max_concurrent = 4");
    let mut set = JoinSet::new();
    for _ in 0..8 {
        let sandbox = sandbox.clone();
        set.spawn(async move {
            sandbox
                .execute(&script("pwd"), &CancellationToken::new())
                .await
                .map(|r| r.stdout)
        });
    }

    let mut dirs = HashSet::new();
    while let Some(joined) = set.join_next().await {
        dirs.insert(joined.unwrap().unwrap());
    }
    assert_eq!(dirs.len(), 8);
}

#[tokio::test]
async fn test_staging_directories_are_cleaned_up() {
    let (root, sandbox, queue) = setup("");
    sandbox
        .execute(&script("true"), &CancellationToken::new())
        .await
        .unwrap();
    queue.flush().await;

    let leftover: Vec<_> = std::fs::read_dir(root.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("c_"))
        .collect();
    assert!(leftover.is_empty(), "left behind: {leftover:?}");
}

#[tokio::test]
async fn test_output_is_capped() {
    let (_root, sandbox, _queue) = setup("max_output_kb = 1");
    let result = sandbox
        .execute(
            &script("head -c 5000 /dev/zero | tr '\\0' 'x'"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.stdout.len(), 1024);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_peak_memory_is_sampled() {
    let (_root, sandbox, _queue) = setup("");
    let result = sandbox
        .execute(&script("sleep 0.3"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.peak_memory_kb.is_some_and(|kb| kb > 0));
}
