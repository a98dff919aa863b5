//! `daily_crawl` CLI entry point: a thin `clap` shell over
//! [`ai_insight_tracker::pipeline::run_daily_task`], per spec §6's CLI
//! surface table.

use std::path::PathBuf;
use std::process::ExitCode;

use ai_insight_tracker::config::Settings;
use ai_insight_tracker::pipeline::{exit_code_for_error, run_daily_task, PipelineTask};
use ai_insight_tracker::prompts::FilePromptStore;
use clap::Parser;
use tracing::{error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

/// Runs one phase (or all phases, in order) of the daily ingestion/analysis
/// pipeline.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Which pipeline phase to run.
    #[arg(long, value_enum)]
    task: PipelineTask,

    /// Path to `config.yaml`.
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Directory holding `papers/`, `news/`, `reports/`, and id-tracker files.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory of prompt-template overrides (see `FilePromptStore`).
    #[arg(long, default_value = "prompts")]
    prompts_dir: PathBuf,

    /// Skip `Settings` validation (useful for phases that don't need an LLM
    /// key configured, e.g. `update-file-list`).
    #[arg(long)]
    skip_config_check: bool,
}

#[tokio::main]
#[instrument]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let cli = Cli::parse();

    let settings = match Settings::load_with_validation(Some(&cli.config), !cli.skip_config_check) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "configuration invalid");
            return ExitCode::from(1);
        }
    };

    let store = FilePromptStore::new().load_overrides(&cli.prompts_dir).await;

    info!(task = ?cli.task, "starting daily_crawl task");
    match run_daily_task(cli.task, &cli.data_dir, &settings, &store).await {
        Ok(status) => {
            info!(?status, "daily_crawl task complete");
            ExitCode::from(status.exit_code() as u8)
        }
        Err(e) => {
            error!(error = %e, "daily_crawl task failed");
            ExitCode::from(exit_code_for_error(&e) as u8)
        }
    }
}
