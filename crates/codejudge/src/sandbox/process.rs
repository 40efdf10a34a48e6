//! Local process sandbox
//!
//! Compiles and runs programs with the toolchains named in the language config.
//! Each call stages its source into a fresh directory, holds a worker slot for
//! every toolchain invocation and kills the subprocess on timeout or
//! cancellation.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::config::{CommandPaths, Config, Language};
use crate::sandbox::memory::MemorySampler;
use crate::sandbox::{Sandbox, SandboxError, SandboxRequest, WorkerPool};
use crate::staging::{StagedSource, StagingArea, normalize_line_endings, sanitize_source};
use crate::types::{ExecutionResult, LanguageId};

/// How long output readers may lag behind process exit before being abandoned
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Sandbox backed by local compiler and runtime processes
#[derive(Debug, Clone)]
pub struct ProcessSandbox {
    config: Arc<Config>,
    staging: StagingArea,
    pool: WorkerPool,
}

impl ProcessSandbox {
    /// Create a sandbox whose worker pool is sized from the config
    pub fn new(config: Arc<Config>, staging: StagingArea) -> Self {
        let pool = WorkerPool::new(config.worker_count(), config.queue_timeout());
        Self::with_pool(config, staging, pool)
    }

    /// Create a sandbox sharing an existing worker pool
    pub fn with_pool(config: Arc<Config>, staging: StagingArea, pool: WorkerPool) -> Self {
        Self {
            config,
            staging,
            pool,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Result<OwnedSemaphorePermit, SandboxError> {
        tokio::select! {
            permit = self.pool.acquire() => permit,
            () = cancel.cancelled() => Err(SandboxError::Cancelled),
        }
    }

    /// Stage the request's source and compile it, returning compiler diagnostics
    #[instrument(skip(self, request, cancel), fields(language = %request.language))]
    async fn stage_and_compile(
        &self,
        request: &SandboxRequest,
        cancel: &CancellationToken,
    ) -> Result<(StagedSource, String), SandboxError> {
        let language = self.config.get_language(request.language)?;
        let source = sanitize_source(request.language, &request.code);
        let staged = self
            .staging
            .stage(request.language, &language.source_name, &source)
            .await?;

        let argv = expand(language, &staged, &language.compile.command);
        let timeout = self.config.compile_timeout();

        let outcome = {
            let _permit = self.acquire(cancel).await?;
            run_process(
                ProcessSpec {
                    language: request.language,
                    argv: &argv,
                    env: &language.compile.env,
                    cwd: staged.dir(),
                    stdin: None,
                    timeout,
                    max_output: self.config.max_output_bytes(),
                    sample_interval: None,
                },
                cancel,
            )
            .await?
        };

        // Compiler diagnostics may land on either stream
        let mut diagnostics = outcome.stdout;
        if !diagnostics.is_empty() && !outcome.stderr.is_empty() && !diagnostics.ends_with('\n') {
            diagnostics.push('\n');
        }
        diagnostics.push_str(&outcome.stderr);

        match outcome.exit {
            Exit::TimedOut => {
                warn!(?timeout, "compilation timed out");
                Err(SandboxError::CompileTimeout(timeout))
            }
            Exit::Status(status) if status.success() => {
                debug!(elapsed = ?outcome.elapsed, "compilation succeeded");
                Ok((staged, diagnostics))
            }
            Exit::Status(status) => {
                debug!(%status, "compilation failed");
                Err(SandboxError::Compile {
                    stderr: diagnostics,
                })
            }
        }
    }

    /// Run a compiled program once
    #[instrument(skip(self, staged, stdin, cancel), fields(language = %language_id))]
    async fn run_staged(
        &self,
        language_id: LanguageId,
        staged: &StagedSource,
        stdin: Option<&str>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, SandboxError> {
        let language = self.config.get_language(language_id)?;
        let argv = expand(language, staged, &language.run.command);

        let outcome = {
            let _permit = self.acquire(cancel).await?;
            run_process(
                ProcessSpec {
                    language: language_id,
                    argv: &argv,
                    env: &language.run.env,
                    cwd: staged.dir(),
                    stdin,
                    timeout,
                    max_output: self.config.max_output_bytes(),
                    sample_interval: Some(self.config.memory_sample_interval()),
                },
                cancel,
            )
            .await?
        };

        let exec_time_ms = u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX);
        match outcome.exit {
            Exit::TimedOut => Err(SandboxError::TimeLimit {
                exec_time_ms,
                stderr: outcome.stderr,
            }),
            Exit::Status(status) if status.success() => Ok(ExecutionResult {
                stdout: outcome.stdout,
                stderr: outcome.stderr,
                exec_time_ms,
                peak_memory_kb: outcome.peak_memory_kb,
            }),
            Exit::Status(status) => Err(SandboxError::Runtime {
                status: status.to_string(),
                stdout: outcome.stdout,
                stderr: outcome.stderr,
                exec_time_ms,
            }),
        }
    }

    fn run_timeout(&self, request: &SandboxRequest) -> Duration {
        request
            .timeout
            .unwrap_or_else(|| self.config.default_run_timeout())
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn compile(
        &self,
        request: &SandboxRequest,
        cancel: &CancellationToken,
    ) -> Result<String, SandboxError> {
        let (_staged, diagnostics) = self.stage_and_compile(request, cancel).await?;
        Ok(diagnostics)
    }

    async fn execute(
        &self,
        request: &SandboxRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, SandboxError> {
        let (staged, _diagnostics) = self.stage_and_compile(request, cancel).await?;
        self.run_staged(
            request.language,
            &staged,
            request.input.as_deref(),
            self.run_timeout(request),
            cancel,
        )
        .await
    }

    /// Compiles once, then runs every payload against the same artifacts
    async fn execute_many(
        &self,
        request: &SandboxRequest,
        inputs: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<Result<ExecutionResult, SandboxError>>, SandboxError> {
        let (staged, _diagnostics) = self.stage_and_compile(request, cancel).await?;
        let timeout = self.run_timeout(request);

        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            match self
                .run_staged(request.language, &staged, Some(input), timeout, cancel)
                .await
            {
                Err(SandboxError::Cancelled) => return Err(SandboxError::Cancelled),
                other => results.push(other),
            }
        }
        Ok(results)
    }
}

fn expand(language: &Language, staged: &StagedSource, template: &[String]) -> Vec<String> {
    let source = staged.source_path().to_string_lossy();
    let binary = staged.artifact_path(&language.compile.output_name);
    let binary = binary.to_string_lossy();
    let dir = staged.dir().to_string_lossy();
    Language::expand_command(
        template,
        &CommandPaths {
            source: &source,
            binary: &binary,
            dir: &dir,
            class: language.class_name(),
        },
    )
}

struct ProcessSpec<'a> {
    language: LanguageId,
    argv: &'a [String],
    env: &'a HashMap<String, String>,
    cwd: &'a Path,
    stdin: Option<&'a str>,
    timeout: Duration,
    max_output: u64,
    sample_interval: Option<Duration>,
}

enum Exit {
    Status(ExitStatus),
    TimedOut,
}

struct ProcessOutcome {
    exit: Exit,
    stdout: String,
    stderr: String,
    elapsed: Duration,
    peak_memory_kb: Option<u64>,
}

enum Waited {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

/// Spawn one process, feed it stdin and wait for exit, timeout or cancellation
async fn run_process(
    spec: ProcessSpec<'_>,
    cancel: &CancellationToken,
) -> Result<ProcessOutcome, SandboxError> {
    let (program, args) = spec
        .argv
        .split_first()
        .ok_or(SandboxError::EmptyCommand(spec.language))?;

    debug!(argv = ?spec.argv, timeout = ?spec.timeout, "spawning process");

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(spec.cwd)
        .envs(spec.env)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started = Instant::now();
    let mut child = command.spawn().map_err(|source| SandboxError::Spawn {
        program: program.clone(),
        source,
    })?;

    let sampler = spec
        .sample_interval
        .zip(child.id())
        .map(|(interval, pid)| MemorySampler::start(pid, interval));

    if let (Some(data), Some(mut pipe)) = (spec.stdin, child.stdin.take()) {
        let data = data.as_bytes().to_vec();
        tokio::spawn(async move {
            // Programs may exit without reading their input
            if let Err(e) = pipe.write_all(&data).await {
                debug!(error = %e, "stdin closed early");
            }
        });
    }

    let stdout = tokio::spawn(read_capped(child.stdout.take(), spec.max_output));
    let stderr = tokio::spawn(read_capped(child.stderr.take(), spec.max_output));

    let waited = tokio::select! {
        status = child.wait() => Waited::Exited(status?),
        () = tokio::time::sleep(spec.timeout) => Waited::TimedOut,
        () = cancel.cancelled() => Waited::Cancelled,
    };
    let elapsed = started.elapsed();

    let exit = match waited {
        Waited::Exited(status) => Exit::Status(status),
        Waited::TimedOut | Waited::Cancelled => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to kill process");
            }
            if matches!(waited, Waited::Cancelled) {
                debug!("process killed on cancellation");
                return Err(SandboxError::Cancelled);
            }
            debug!(?elapsed, "process killed on timeout");
            Exit::TimedOut
        }
    };

    let peak_memory_kb = sampler.and_then(MemorySampler::finish);
    let stdout = collect_output(stdout).await;
    let stderr = collect_output(stderr).await;

    Ok(ProcessOutcome {
        exit,
        stdout,
        stderr,
        elapsed,
        peak_memory_kb,
    })
}

/// Read up to `limit` bytes, then discard the rest so the writer never blocks
async fn read_capped<R>(reader: Option<R>, limit: u64) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(Vec::new());
    };
    let mut buf = Vec::new();
    let mut limited = reader.take(limit);
    limited.read_to_end(&mut buf).await?;
    let mut rest = limited.into_inner();
    tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;
    Ok(buf)
}

async fn collect_output(mut task: JoinHandle<io::Result<Vec<u8>>>) -> String {
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await {
        Ok(Ok(Ok(bytes))) => normalize_line_endings(&String::from_utf8_lossy(&bytes)).into_owned(),
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "failed to read process output");
            String::new()
        }
        Ok(Err(e)) => {
            warn!(error = %e, "output reader task failed");
            String::new()
        }
        Err(_elapsed) => {
            // A surviving grandchild still holds the pipe open
            warn!("output pipe still open after process exit");
            task.abort();
            String::new()
        }
    }
}
