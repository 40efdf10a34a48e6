//! Codejudge CLI
//!
//! A command-line tool for judging function-style submissions against local
//! toolchains.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codejudge::{
    CleanupQueue, Config, EXAMPLE_CONFIG, HarnessSpec, Judge, LanguageId, MemoryStore,
    Normalizer, PatternNormalizer, Problem, ProcessSandbox, Sandbox, SandboxRequest,
    StagingArea, SubmitRequest, Verdict, WireResponse, synthesize,
};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codejudge")]
#[command(about = "Judge function-style submissions with local compilers")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new configuration file
    Init {
        /// Output path (default: codejudge.toml)
        #[arg(short, long, default_value = "codejudge.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// List configured languages
    Languages,

    /// Show the effective configuration
    ShowConfig,

    /// Print the program synthesized for one test case
    Harness {
        /// Problem definition (JSON)
        #[arg(short, long)]
        problem: PathBuf,

        /// Language ID (cpp, c, java)
        #[arg(short, long)]
        language: LanguageId,

        /// 1-based test case number, counting public then hidden cases
        #[arg(long, default_value = "1")]
        case: usize,

        /// Solution source file
        #[arg(value_name = "FILE")]
        source: PathBuf,
    },

    /// Execute a JSON sandbox request read from stdin
    Sandbox {
        /// Run step time limit in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Preview a solution against the public test cases
    Run {
        #[arg(short, long)]
        problem: PathBuf,

        #[arg(short, long)]
        language: LanguageId,

        #[arg(value_name = "FILE")]
        source: PathBuf,
    },

    /// Grade a solution against all test cases
    Submit {
        #[arg(short, long)]
        problem: PathBuf,

        #[arg(short, long)]
        language: LanguageId,

        /// User the submission is recorded for
        #[arg(short, long, default_value = "local")]
        user: String,

        #[arg(value_name = "FILE")]
        source: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    // stdout carries JSON results, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };
    let config = Arc::new(config);

    let success = match cli.command {
        Commands::Init { output, force } => {
            init_config(&output, force).await?;
            true
        }
        Commands::Languages => {
            list_languages(&config);
            true
        }
        Commands::ShowConfig => {
            show_config(&config);
            true
        }
        Commands::Harness {
            problem,
            language,
            case,
            source,
        } => {
            print_harness(&config, &problem, language, case, &source).await?;
            true
        }
        Commands::Sandbox { timeout_ms } => {
            let (sandbox, cleanup) = process_sandbox(&config);
            let result = run_sandbox_request(sandbox, timeout_ms).await;
            finish_cleanup(cleanup).await;
            result?
        }
        Commands::Run {
            problem,
            language,
            source,
        } => {
            let (sandbox, cleanup) = process_sandbox(&config);
            let result = run_preview(&config, sandbox, &problem, language, &source).await;
            finish_cleanup(cleanup).await;
            result?
        }
        Commands::Submit {
            problem,
            language,
            user,
            source,
        } => {
            let (sandbox, cleanup) = process_sandbox(&config);
            let result = run_submit(&config, sandbox, &problem, language, user, &source).await;
            finish_cleanup(cleanup).await;
            result?
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// Build a process sandbox and its cleanup task
fn process_sandbox(config: &Arc<Config>) -> (Arc<ProcessSandbox>, JoinHandle<()>) {
    let (cleanup, handle) = CleanupQueue::spawn(config.cleanup_grace());
    let staging = StagingArea::new(config.staging_root.clone(), cleanup);
    (
        Arc::new(ProcessSandbox::new(Arc::clone(config), staging)),
        handle,
    )
}

/// Wait for the cleanup task once every staging handle is gone
async fn finish_cleanup(handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        warn!(error = %e, "cleanup task failed");
    }
}

/// Token cancelled on Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            token.cancel();
        }
    });
    cancel
}

async fn load_problem(path: &Path) -> Result<Problem> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read problem file '{}'", path.display()))?;
    let problem: Problem = serde_json::from_str(&content)
        .with_context(|| format!("invalid problem file '{}'", path.display()))?;
    problem.validate().context("invalid problem")?;
    Ok(problem)
}

async fn read_source(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read source file '{}'", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize result")?;
    println!("{json}");
    Ok(())
}

async fn print_harness(
    config: &Config,
    problem_path: &Path,
    language: LanguageId,
    case: usize,
    source: &Path,
) -> Result<()> {
    let problem = load_problem(problem_path).await?;
    let code = read_source(source).await?;
    let toolchain = config
        .get_language(language)
        .context("unsupported language")?;

    let test_case = case
        .checked_sub(1)
        .and_then(|i| problem.all_test_cases().nth(i))
        .with_context(|| {
            format!(
                "problem '{}' has no test case {case} ({} total)",
                problem.id,
                problem.total_test_cases()
            )
        })?;

    let signature = problem
        .signature(language)
        .or(toolchain.default_signature.as_deref())
        .unwrap_or_default();
    let class_name = toolchain.class_name();

    let normalized = PatternNormalizer::new().normalize(language, &code, signature, class_name);
    let spec = HarnessSpec::resolve(language, signature, &problem.function_name)
        .context("invalid signature")?;
    let harness = synthesize(language, &normalized, &test_case.input, &spec, class_name)
        .context("failed to synthesize harness")?;

    debug!(offset = harness.user_line_offset, "synthesized harness");
    print!("{}", harness.source);
    Ok(())
}

async fn run_sandbox_request(
    sandbox: Arc<ProcessSandbox>,
    timeout_ms: Option<u64>,
) -> Result<bool> {
    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("failed to read request from stdin")?;
    let mut request: SandboxRequest =
        serde_json::from_str(&raw).context("invalid sandbox request")?;
    if let Some(ms) = timeout_ms {
        request = request.with_timeout(std::time::Duration::from_millis(ms));
    }

    info!(language = %request.language, "executing sandbox request");
    let cancel = cancel_on_interrupt();
    let response = WireResponse::from(sandbox.execute(&request, &cancel).await);
    print_json(&response)?;
    Ok(matches!(response, WireResponse::Success(_)))
}

async fn build_judge(
    config: &Arc<Config>,
    sandbox: Arc<ProcessSandbox>,
    problem: Problem,
) -> Result<Judge> {
    let store = Arc::new(MemoryStore::new());
    store
        .insert_problem(problem)
        .await
        .context("failed to load problem")?;
    Ok(Judge::new(
        Arc::clone(config),
        sandbox as Arc<dyn Sandbox>,
        store.clone(),
        store,
    ))
}

async fn run_preview(
    config: &Arc<Config>,
    sandbox: Arc<ProcessSandbox>,
    problem_path: &Path,
    language: LanguageId,
    source: &Path,
) -> Result<bool> {
    let problem = load_problem(problem_path).await?;
    let problem_id = problem.id.clone();
    let code = read_source(source).await?;
    let judge = build_judge(config, sandbox, problem).await?;

    let reports = judge
        .run(&problem_id, &code, language, &cancel_on_interrupt())
        .await
        .context("run failed")?;
    print_json(&reports)?;
    Ok(reports
        .iter()
        .all(|r| r.status == codejudge::CaseStatus::Passed))
}

async fn run_submit(
    config: &Arc<Config>,
    sandbox: Arc<ProcessSandbox>,
    problem_path: &Path,
    language: LanguageId,
    user: String,
    source: &Path,
) -> Result<bool> {
    let problem = load_problem(problem_path).await?;
    let request = SubmitRequest {
        user_id: user,
        problem_id: problem.id.clone(),
        code: read_source(source).await?,
        language,
    };
    let judge = build_judge(config, sandbox, problem).await?;

    let outcome = judge
        .submit(&request, &cancel_on_interrupt())
        .await
        .context("submission failed")?;

    info!(
        status = %outcome.status,
        passed = outcome.test_cases_passed,
        total = outcome.total_test_cases,
        time_ms = outcome.execution_time,
        "verdict"
    );
    print_json(&outcome)?;
    Ok(outcome.status == Verdict::Accepted)
}

fn list_languages(config: &Config) {
    println!("Available languages:\n");

    let mut languages: Vec<_> = config.languages.iter().collect();
    languages.sort_by_key(|(id, _)| *id);

    for (id, lang) in languages {
        println!("  {:<8} {} ({})", id, lang.name, lang.source_name);
        if let Some(signature) = &lang.default_signature {
            println!("  {:<8} default signature: {signature}", "");
        }
    }
}

fn show_config(config: &Config) {
    println!("Staging root: {}", config.staging_root.display());
    println!("Cleanup grace: {:?}", config.cleanup_grace());
    println!();
    println!("Workers: {}", config.worker_count());
    println!("Queue timeout: {:?}", config.queue_timeout());
    println!();
    println!("Compile timeout: {:?}", config.compile_timeout());
    println!("Run grace: {} ms", config.run_grace_ms);
    println!("Default run timeout: {:?}", config.default_run_timeout());
    println!("Output cap: {} KB", config.max_output_kb);
    println!("Memory sample interval: {:?}", config.memory_sample_interval());
    println!();
    println!("Languages configured: {}", config.languages.len());
}

async fn init_config(output: &PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
