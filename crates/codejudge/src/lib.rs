//! A library for judging function-style coding submissions.
//!
//! Codejudge takes a bare solution function written in C++, C or Java, wraps
//! it in a generated program for each test case, compiles and runs that
//! program with local toolchains and turns the results into a verdict.
//!
//! # Features
//!
//! - **Signature normalization**: the user's first function is rewritten to the problem's required signature.
//! - **Harness synthesis**: test inputs such as `nums = [2,7,11,15], target = 9` become typed declarations, a call and a print step.
//! - **Process sandbox**: per-call staging directories, wall clock and compile timeouts, output caps and peak memory sampling.
//! - **Bounded concurrency**: a worker pool with queueing backpressure limits toolchain invocations.
//! - **Diagnostics**: compiler output is mapped back onto the user's own line numbers.
//! - **Judging**: preview runs over public cases and graded submissions with stored results.

pub use classify::{Diagnostics, classify_diagnostics, summarize_runtime_error};
pub use config::{Config, ConfigError, EXAMPLE_CONFIG, Language};
pub use harness::{Harness, HarnessError, HarnessSpec, ReturnCategory, synthesize};
pub use judge::{FailedCase, Judge, JudgeError, RunCaseReport, SubmitOutcome, SubmitRequest};
pub use normalize::{Normalizer, PatternNormalizer};
pub use problem::{
    MemoryStore, Problem, ProblemStore, StoreError, Submission, SubmissionStore, TestCase,
};
pub use sandbox::{
    ProcessSandbox, Sandbox, SandboxError, SandboxRequest, WireResponse, WorkerPool,
};
pub use staging::{CleanupQueue, StagingArea};
pub use types::{CaseStatus, ExecutionResult, LanguageId, Verdict};

pub mod classify;
pub mod config;
pub mod harness;
pub mod judge;
pub mod normalize;
pub mod problem;
pub mod sandbox;
pub mod staging;
pub mod types;
