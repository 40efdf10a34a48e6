//! Problems, submissions and the storage traits the judge talks to

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::types::{LanguageId, Verdict};

/// Longest error message stored on a submission, in characters
pub const MAX_ERROR_MESSAGE_CHARS: usize = 1000;

pub const TIME_LIMIT_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=10_000;
pub const MEMORY_LIMIT_RANGE_MB: std::ops::RangeInclusive<u64> = 16..=1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("time limit {0} ms outside 100..=10000")]
    TimeLimit(u64),

    #[error("memory limit {0} MB outside 16..=1024")]
    MemoryLimit(u64),

    #[error("function name is empty")]
    EmptyFunctionName,

    #[error("problem id is empty")]
    EmptyId,

    #[error("{passed} tests passed out of {total}")]
    PassedExceedsTotal { passed: usize, total: usize },

    #[error("error message longer than {MAX_ERROR_MESSAGE_CHARS} characters")]
    ErrorMessageTooLong,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("problem '{0}' not found")]
    NotFound(String),

    #[error("invalid record: {0}")]
    Invalid(#[from] ValidationError),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// One input/expected-output pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl TestCase {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            explanation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_function_name")]
    pub function_name: String,

    /// Required signature per language
    #[serde(default)]
    pub signatures: HashMap<LanguageId, String>,

    #[serde(default)]
    pub public_test_cases: Vec<TestCase>,
    #[serde(default)]
    pub hidden_test_cases: Vec<TestCase>,

    #[serde(rename = "timeLimit", default = "default_time_limit_ms")]
    pub time_limit_ms: u64,

    /// Advisory only; not enforced
    #[serde(rename = "memoryLimit", default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,

    #[serde(default)]
    pub submission_count: u64,
    #[serde(default)]
    pub success_count: u64,
}

fn default_function_name() -> String {
    "solution".to_owned()
}

fn default_time_limit_ms() -> u64 {
    1000
}

fn default_memory_limit_mb() -> u64 {
    256
}

impl Problem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            function_name: default_function_name(),
            signatures: HashMap::new(),
            public_test_cases: Vec::new(),
            hidden_test_cases: Vec::new(),
            time_limit_ms: default_time_limit_ms(),
            memory_limit_mb: default_memory_limit_mb(),
            submission_count: 0,
            success_count: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.function_name.trim().is_empty() {
            return Err(ValidationError::EmptyFunctionName);
        }
        if !TIME_LIMIT_RANGE_MS.contains(&self.time_limit_ms) {
            return Err(ValidationError::TimeLimit(self.time_limit_ms));
        }
        if !MEMORY_LIMIT_RANGE_MB.contains(&self.memory_limit_mb) {
            return Err(ValidationError::MemoryLimit(self.memory_limit_mb));
        }
        Ok(())
    }

    /// The problem's own signature for `language`, if it defines one
    pub fn signature(&self, language: LanguageId) -> Option<&str> {
        self.signatures
            .get(&language)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Public test cases followed by hidden ones
    pub fn all_test_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.public_test_cases
            .iter()
            .chain(self.hidden_test_cases.iter())
    }

    pub fn total_test_cases(&self) -> usize {
        self.public_test_cases.len() + self.hidden_test_cases.len()
    }
}

/// A judged submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub user_id: String,
    pub problem_id: String,
    pub code: String,
    pub language: LanguageId,
    pub status: Verdict,

    /// Sum of run times over the executed test cases
    #[serde(rename = "executionTime")]
    pub execution_time_ms: u64,

    #[serde(rename = "memoryUsed")]
    pub memory_used_kb: Option<u64>,

    pub test_cases_passed: usize,
    pub total_test_cases: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Unix time in milliseconds
    #[serde(rename = "createdAt")]
    pub created_at_ms: u64,
}

impl Submission {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.test_cases_passed > self.total_test_cases {
            return Err(ValidationError::PassedExceedsTotal {
                passed: self.test_cases_passed,
                total: self.total_test_cases,
            });
        }
        if self
            .error_message
            .as_ref()
            .is_some_and(|m| m.chars().count() > MAX_ERROR_MESSAGE_CHARS)
        {
            return Err(ValidationError::ErrorMessageTooLong);
        }
        Ok(())
    }
}

/// Cut `message` to at most [`MAX_ERROR_MESSAGE_CHARS`] characters
pub fn truncate_error_message(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_MESSAGE_CHARS) {
        Some((cut, _)) => message[..cut].to_owned(),
        None => message.to_owned(),
    }
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[async_trait]
pub trait ProblemStore: Send + Sync {
    async fn problem(&self, id: &str) -> Result<Option<Problem>, StoreError>;

    /// Count one judged submission, and one success when `accepted`
    async fn record_attempt(&self, id: &str, accepted: bool) -> Result<(), StoreError>;
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn create(&self, submission: Submission) -> Result<Submission, StoreError>;
}

/// In-memory problem and submission storage
#[derive(Debug, Default)]
pub struct MemoryStore {
    problems: RwLock<HashMap<String, Problem>>,
    submissions: RwLock<Vec<Submission>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a problem after validating it
    pub async fn insert_problem(&self, problem: Problem) -> Result<(), StoreError> {
        problem.validate()?;
        debug!(id = %problem.id, "storing problem");
        self.problems.write().await.insert(problem.id.clone(), problem);
        Ok(())
    }

    pub async fn submissions(&self) -> Vec<Submission> {
        self.submissions.read().await.clone()
    }
}

#[async_trait]
impl ProblemStore for MemoryStore {
    async fn problem(&self, id: &str) -> Result<Option<Problem>, StoreError> {
        Ok(self.problems.read().await.get(id).cloned())
    }

    async fn record_attempt(&self, id: &str, accepted: bool) -> Result<(), StoreError> {
        let mut problems = self.problems.write().await;
        let problem = problems
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_owned()))?;
        problem.submission_count += 1;
        if accepted {
            problem.success_count += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn create(&self, submission: Submission) -> Result<Submission, StoreError> {
        submission.validate()?;
        self.submissions.write().await.push(submission.clone());
        Ok(submission)
    }
}
