//! Integration tests for codejudge
//!
//! Process-level tests drive `sh` through language entries that "compile" by
//! copying the staged script. Tests against real g++/gcc/javac toolchains need
//! the `toolchain-tests` feature:
//!
//!    cargo test -p codejudge --features toolchain-tests

use std::path::Path;
use std::sync::Arc;

use codejudge::config::Config;
use codejudge::problem::Problem;
use codejudge::{CleanupQueue, MemoryStore, ProcessSandbox, StagingArea};

mod config_loading;
mod judge_flow;
#[cfg(unix)]
mod process_sandbox;
#[cfg(feature = "toolchain-tests")]
mod toolchains;

const FIXTURES_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

/// Helper to get fixture file content
pub(crate) fn fixture(path: &str) -> String {
    let path = format!("{FIXTURES_PATH}/{path}");
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read fixture {path}: {e}"))
}

pub(crate) fn fixture_problem(name: &str) -> Problem {
    serde_json::from_str(&fixture(&format!("problems/{name}.json")))
        .unwrap_or_else(|e| panic!("Invalid problem fixture {name}: {e}"))
}

pub(crate) async fn store_with(problem: Problem) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert_problem(problem).await.expect("valid problem");
    store
}

/// Config whose C entry runs the staged source as a shell script.
///
/// `compile` is the compile command; `{source}`, `{binary}` and `{dir}` expand
/// as usual.
pub(crate) fn sh_config(staging_root: &Path, compile: &[&str], extra: &str) -> Config {
    let compile = compile
        .iter()
        .map(|arg| format!("{arg:?}"))
        .collect::<Vec<_>>()
        .join(", ");
    let toml = format!(
        r#"
staging_root = {root:?}
cleanup_grace_secs = 0
compile_timeout_secs = 1
default_run_timeout_ms = 2000
memory_sample_interval_ms = 2
{extra}

[languages.c]
name = "POSIX shell"
source_name = "script.sh"

[languages.c.compile]
command = [{compile}]
output_name = "run.sh"

[languages.c.run]
command = ["sh", "{{binary}}"]
"#,
        root = staging_root.display().to_string(),
    );
    Config::parse_toml(&toml).expect("valid sh config")
}

/// Process sandbox plus the cleanup queue its staging area feeds
pub(crate) fn process_sandbox(config: Config) -> (ProcessSandbox, CleanupQueue) {
    let (queue, _task) = CleanupQueue::spawn(config.cleanup_grace());
    let staging = StagingArea::new(config.staging_root.clone(), queue.clone());
    (ProcessSandbox::new(Arc::new(config), staging), queue)
}
