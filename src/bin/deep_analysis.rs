//! `deep_analysis` CLI entry point: a thin `clap` shell over
//! [`ai_insight_tracker::deep::run_deep_analysis`], driven by a GitHub issue
//! title/body, per spec §6's CLI surface table.

use std::path::PathBuf;
use std::process::ExitCode;

use ai_insight_tracker::config::Settings;
use ai_insight_tracker::deep::run_deep_analysis;
use ai_insight_tracker::error::CoreError;
use ai_insight_tracker::notifier::notifier_for;
use ai_insight_tracker::persistence::write_atomic;
use ai_insight_tracker::persistence::write_json_atomic;
use ai_insight_tracker::prompts::FilePromptStore;
use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

/// Runs an on-demand deep-analysis of one arXiv paper, triggered by a
/// `[Analysis] {id}[vN]?: {title}` GitHub issue.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    issue_number: u64,

    #[arg(long)]
    issue_title: String,

    #[arg(long)]
    issue_body: String,

    /// `owner/repo`, used to build notification/issue links. Falls back to
    /// `GITHUB_REPOSITORY` (via `Settings`) when omitted.
    #[arg(long)]
    repo: Option<String>,

    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[arg(long, default_value = "prompts")]
    prompts_dir: PathBuf,

    #[arg(long)]
    skip_config_check: bool,
}

/// Case-insensitive `[Analysis] {id}[vN]?: {title}` matcher, per spec §6.
static TITLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\[analysis\]\s*(\d+\.\d+)(?:v\d+)?\s*:\s*(.+)$").unwrap());

fn parse_issue_title(title: &str) -> Option<(String, String)> {
    let captures = TITLE_PATTERN.captures(title.trim())?;
    let paper_id = captures.get(1)?.as_str().to_string();
    let paper_title = captures.get(2)?.as_str().trim().to_string();
    Some((paper_id, paper_title))
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DeepAnalysisStatus {
    #[serde(default)]
    processing_ids: Vec<String>,
}

async fn mark_processing(status_path: &std::path::Path, paper_id: &str) {
    let mut status: DeepAnalysisStatus =
        ai_insight_tracker::persistence::read_json_lenient(status_path).await.ok().flatten().unwrap_or_default();
    if !status.processing_ids.contains(&paper_id.to_string()) {
        status.processing_ids.push(paper_id.to_string());
    }
    if let Err(e) = write_json_atomic(status_path, &status).await {
        warn!(error = %e, "failed to write deep-analysis status file");
    }
}

async fn clear_processing(status_path: &std::path::Path, paper_id: &str) {
    let mut status: DeepAnalysisStatus =
        ai_insight_tracker::persistence::read_json_lenient(status_path).await.ok().flatten().unwrap_or_default();
    status.processing_ids.retain(|id| id != paper_id);
    if let Err(e) = write_json_atomic(status_path, &status).await {
        warn!(error = %e, "failed to clear deep-analysis status file");
    }
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

    let Some((paper_id, paper_title)) = parse_issue_title(&cli.issue_title) else {
        error!(title = %cli.issue_title, "issue title does not match the [Analysis] {{id}}: {{title}} pattern");
        return ExitCode::from(1);
    };

    let settings = match Settings::load_with_validation(Some(&cli.config), !cli.skip_config_check) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "configuration invalid");
            return ExitCode::from(1);
        }
    };

    let repo = cli.repo.clone().or_else(|| settings.github_repository.clone());
    let store = FilePromptStore::new().load_overrides(&cli.prompts_dir).await;

    let status_path = cli.data_dir.join("analysis").join("deep_analysis_status.json");
    mark_processing(&status_path, &paper_id).await;

    info!(paper_id, issue_number = cli.issue_number, "starting deep analysis");
    let result = run_deep_analysis(&paper_id, Some(cli.issue_body.clone()), &settings, &store).await;

    clear_processing(&status_path, &paper_id).await;

    let result = match result {
        Ok(result) => result,
        Err(CoreError::PaperNotFound(id)) => {
            error!(paper_id = %id, "arxiv paper not found");
            return ExitCode::from(2);
        }
        Err(e) => {
            error!(error = %e, "deep analysis failed");
            return ExitCode::from(3);
        }
    };

    let md_path = cli.data_dir.join("analysis").join("deep").join(format!("{paper_id}.md"));
    let markdown = format!("# {paper_title}\n\n{}", result.report);
    if let Err(e) = write_atomic(&md_path, markdown.as_bytes()).await {
        error!(error = %e, "failed to write deep analysis markdown");
        return ExitCode::from(3);
    }

    let issue_url = match &repo {
        Some(repo) => format!("https://github.com/{repo}/issues/{}", cli.issue_number),
        None => format!("issue #{}", cli.issue_number),
    };
    let notifier = notifier_for(&settings.notification);
    let summary: String = result.report.chars().take(500).collect();
    let sent = notifier.send_deep_analysis(&paper_id, &paper_title, &summary, &issue_url).await;
    notifier.close().await;
    info!(sent, path = %md_path.display(), "deep analysis complete");

    ExitCode::from(0)
}
