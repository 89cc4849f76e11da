mod adapters;
mod config;
mod core;
mod hooks;

use adapters::llm::{ProviderConfig, Vendor};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ai-review")]
#[command(about = "Reviews the changes of the latest commit with an LLM", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "AI vendor to use (openai or anthropic)")]
    vendor: Option<String>,

    #[arg(long, global = true, help = "Model name offered by the vendor")]
    model: Option<String>,

    #[arg(
        long,
        global = true,
        help = "API key for the vendor (defaults to OPENAI_API_KEY or ANTHROPIC_API_KEY)"
    )]
    api_key: Option<String>,

    #[arg(long, global = true)]
    temperature: Option<f32>,

    #[arg(long, global = true, help = "Directory levels of project structure to include")]
    code_depth: Option<usize>,

    #[arg(long, global = true, help = "Comma separated programming languages of the code")]
    program_language: Option<String>,

    #[arg(long, global = true, help = "Language the review is written in")]
    result_output_language: Option<String>,

    #[arg(long, global = true, help = "Token budget per request before a file is split")]
    batch_size: Option<usize>,

    #[arg(long, global = true, help = "Request timeout in seconds")]
    timeout: Option<u64>,

    #[arg(long, global = true)]
    max_retries: Option<usize>,

    #[arg(long, global = true, help = "Also review settings and documentation files")]
    review_all_files: bool,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Review changes in the current commit")]
    Review,
    #[command(about = "Install a git pre-commit hook that runs the review")]
    InstallHook,
}

impl Cli {
    fn overrides(&self) -> config::CliOverrides {
        config::CliOverrides {
            vendor: self.vendor.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            code_depth: self.code_depth,
            program_languages: self.program_language.as_deref().map(config::parse_languages),
            output_language: self.result_output_language.clone(),
            batch_size: self.batch_size,
            timeout_secs: self.timeout,
            max_retries: self.max_retries,
            review_all_files: self.review_all_files,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = config::Config::load().unwrap_or_else(|err| {
        warn!("Ignoring unreadable config file: {:#}", err);
        config::Config::default()
    });
    config.merge_with_cli(cli.overrides());

    match cli.command {
        Commands::Review => {
            if !review_command(config, cli.api_key).await? {
                std::process::exit(1);
            }
        }
        Commands::InstallHook => {
            install_hook_command()?;
        }
    }

    Ok(())
}

/// Returns `false` when nothing was reviewed or a file failed.
async fn review_command(config: config::Config, api_key: Option<String>) -> Result<bool> {
    let vendor: Vendor = config.vendor.parse()?;
    let api_key = api_key
        .or_else(|| std::env::var(vendor.api_key_env()).ok())
        .unwrap_or_default();

    let provider = ProviderConfig {
        vendor,
        model_name: config.model.clone(),
        api_key,
        base_url: config.base_url.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        timeout: config.timeout_secs.map(Duration::from_secs),
        max_retries: config.max_retries,
    };
    provider.validate()?;

    let git = core::GitIntegration::new(".")?;
    let repo_root = git.workdir().unwrap_or_else(|| PathBuf::from("."));

    let settings = core::ReviewSettings {
        repo_path: repo_root,
        code_depth: config.code_depth,
        program_languages: config.program_languages.clone(),
        output_language: config.output_language.clone(),
        batch_size: config.batch_size,
        ignore_settings_files: config.ignore_settings_files,
        exclude: config.exclude.clone(),
    };
    let orchestrator = core::ReviewOrchestrator::from_config(settings, &provider)?;
    info!("{}", orchestrator);

    let changes = match git.latest_commit_changes()? {
        Some(changes) => changes,
        None => {
            println!("This is the initial commit. No changes to review.");
            return Ok(true);
        }
    };

    println!("Reviewing changes in {} file(s)...", changes.len());
    let reviews = orchestrator.review_changes(&changes).await;
    Ok(print_reviews(&reviews))
}

fn install_hook_command() -> Result<()> {
    let git = core::GitIntegration::new(".")?;
    let repo_root = git.workdir().unwrap_or_else(|| PathBuf::from("."));
    let hook_path = hooks::install_pre_commit_hook(&repo_root)?;
    println!("Pre-commit hook installed at {}", hook_path.display());
    Ok(())
}

fn print_reviews(reviews: &[core::FileReview]) -> bool {
    let summary = ReviewSummary::from_reviews(reviews);

    for review in reviews {
        match &review.outcome {
            core::ReviewOutcome::Reviewed(text) => {
                println!("File: {}\nReview:\n{}\n", review.path, text);
            }
            core::ReviewOutcome::Failed(error) => {
                eprintln!("File: {}\nReview failed: {}\n", review.path, error);
            }
            core::ReviewOutcome::Skipped(_) => {}
        }
    }

    if summary.reviewed == 0 && summary.failed == 0 {
        println!("No changes detected or review failed.");
    } else if summary.skipped > 0 {
        info!("Skipped {} file(s)", summary.skipped);
    }

    summary.is_success()
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ReviewSummary {
    reviewed: usize,
    skipped: usize,
    failed: usize,
}

impl ReviewSummary {
    fn from_reviews(reviews: &[core::FileReview]) -> Self {
        let mut summary = Self::default();
        for review in reviews {
            match review.outcome {
                core::ReviewOutcome::Reviewed(_) => summary.reviewed += 1,
                core::ReviewOutcome::Skipped(_) => summary.skipped += 1,
                core::ReviewOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    // "Nothing reviewed" and "a review failed" both fail the run.
    fn is_success(&self) -> bool {
        self.reviewed > 0 && self.failed == 0
    }
}
