//! Pipeline orchestrator, per spec §4.H: a fixed ordered list of phases
//! (`arxiv → news → analyze → report → update_file_list → notify`), not a
//! generic graph executor. Each phase is a plain sequential `.await` bracketed
//! by a `tracing` span, matching the teacher's `main.rs` sequencing idiom.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use clap::ValueEnum;
use tracing::{info, instrument, warn};

use crate::analysis::{analyze_batch, filter_unanalyzed, NewsTarget, PaperTarget};
use crate::arxiv::ArxivClient;
use crate::config::Settings;
use crate::error::{CoreError, CoreResult};
use crate::ids::IdTracker;
use crate::models::{AnalyzedNews, AnalyzedPaper};
use crate::news::{ingest_news, load_sources, PlaywrightPageFetcher};
use crate::notifier::notifier_for;
use crate::persistence::file_index::rebuild_file_index;
use crate::persistence::{day_files::merge_day_file, read_json_lenient, write_json_atomic};
use crate::prompts::PromptStore;
use crate::report::generate_daily_report;

/// The task names named in spec §4.H's table, plus `all` which runs them in
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum PipelineTask {
    Arxiv,
    #[value(name = "rss")]
    News,
    Analyze,
    Summary,
    UpdateFileList,
    Notify,
    All,
}

/// Per-task outcome, mapped to process exit codes by the CLI entry points:
/// `success=0`, `no_new_content=0`, `process_error=3`. `config_error=1` is
/// produced by [`Settings::load`] before a [`PipelineTask`] ever runs, so it
/// has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Success,
    NoNewContent,
}

impl TaskStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            TaskStatus::Success | TaskStatus::NoNewContent => 0,
        }
    }
}

fn papers_path(base_dir: &Path, date: NaiveDate) -> PathBuf {
    base_dir.join("papers").join(format!("{date}.json"))
}

fn news_path(base_dir: &Path, date: NaiveDate) -> PathBuf {
    base_dir.join("news").join(format!("{date}.json"))
}

fn report_path(base_dir: &Path, date: NaiveDate) -> PathBuf {
    base_dir.join("reports").join(format!("{date}.json"))
}

#[instrument(level = "info", skip(base_dir, settings))]
async fn run_arxiv(base_dir: &Path, settings: &Settings, date: NaiveDate) -> CoreResult<TaskStatus> {
    let client = ArxivClient::new(&settings.arxiv)?;
    let papers = client.fetch_recent_papers(&settings.arxiv.categories, settings.arxiv_hours).await;
    if papers.is_empty() {
        info!("no new arxiv papers in window");
        return Ok(TaskStatus::NoNewContent);
    }

    let fetched_ids = IdTracker::fetched(base_dir.join("fetched_ids.json"));
    let ids: Vec<String> = papers.iter().map(|p| p.id.clone()).collect();
    merge_day_file::<_, crate::models::PaperAnalysis>(&papers_path(base_dir, date), papers).await?;
    fetched_ids.mark_papers(&ids).await?;

    info!(count = ids.len(), "arxiv task complete");
    Ok(TaskStatus::Success)
}

#[instrument(level = "info", skip(base_dir, settings))]
async fn run_news(base_dir: &Path, settings: &Settings, date: NaiveDate) -> CoreResult<TaskStatus> {
    let sources = load_sources(&base_dir.join("sources.yaml")).await?;
    let fetched_ids = IdTracker::fetched(base_dir.join("fetched_ids.json"));
    let fetcher = PlaywrightPageFetcher::new(&settings.news).await?;

    let items = ingest_news(&sources, &settings.news, &fetched_ids, &fetcher).await;
    if items.is_empty() {
        info!("no new news items in window");
        return Ok(TaskStatus::NoNewContent);
    }

    let ids: Vec<String> = items.iter().map(|n| n.id.clone()).collect();
    merge_day_file::<_, crate::models::NewsAnalysis>(&news_path(base_dir, date), items).await?;
    fetched_ids.mark_news(&ids).await?;

    info!(count = ids.len(), "news task complete");
    Ok(TaskStatus::Success)
}

#[instrument(level = "info", skip(base_dir, settings, store))]
async fn run_analyze(
    base_dir: &Path,
    settings: &Settings,
    date: NaiveDate,
    store: &dyn PromptStore,
) -> CoreResult<TaskStatus> {
    let client = crate::llm::OpenAiCompatibleClient::new(
        settings.llm.provider.clone(),
        settings.llm.model.clone(),
        settings.llm.api_key.clone(),
    )
    .with_timeout(std::time::Duration::from_secs_f64(settings.advanced.llm_timeout))
    .with_retry_policy(crate::llm::RetryPolicy::new(
        settings.advanced.llm_max_retries,
        std::time::Duration::from_secs(1),
    ));

    let analyzed_ids = IdTracker::analyzed(base_dir.join("analyzed_ids.json"));
    let analyzed_paper_ids: HashSet<String> = analyzed_ids.paper_ids().await?;
    let analyzed_news_ids: HashSet<String> = analyzed_ids.news_ids().await?;

    let mut papers: Vec<AnalyzedPaper> = read_json_lenient(&papers_path(base_dir, date)).await?.unwrap_or_default();
    let mut news: Vec<AnalyzedNews> = read_json_lenient(&news_path(base_dir, date)).await?.unwrap_or_default();

    let unanalyzed_papers = filter_unanalyzed::<PaperTarget>(
        papers.iter().map(|p| p.base.clone()).collect(),
        &analyzed_paper_ids,
    );
    let unanalyzed_news =
        filter_unanalyzed::<NewsTarget>(news.iter().map(|n| n.base.clone()).collect(), &analyzed_news_ids);

    if unanalyzed_papers.is_empty() && unanalyzed_news.is_empty() {
        info!("nothing to analyze");
        return Ok(TaskStatus::NoNewContent);
    }

    let paper_results = analyze_batch::<PaperTarget>(
        unanalyzed_papers,
        &client,
        store,
        settings.notification.language,
        settings.analysis.max_concurrent,
    )
    .await;
    let news_results = analyze_batch::<NewsTarget>(
        unanalyzed_news,
        &client,
        store,
        settings.notification.language,
        settings.analysis.max_concurrent,
    )
    .await;

    let mut new_paper_ids = Vec::new();
    for result in paper_results {
        new_paper_ids.push(result.base.id.clone());
        if let Some(existing) = papers.iter_mut().find(|p| p.base.id == result.base.id) {
            *existing = result;
        } else {
            papers.push(result);
        }
    }
    let mut new_news_ids = Vec::new();
    for result in news_results {
        new_news_ids.push(result.base.id.clone());
        if let Some(existing) = news.iter_mut().find(|n| n.base.id == result.base.id) {
            *existing = result;
        } else {
            news.push(result);
        }
    }

    write_json_atomic(&papers_path(base_dir, date), &papers).await?;
    write_json_atomic(&news_path(base_dir, date), &news).await?;
    analyzed_ids.mark_papers(&new_paper_ids).await?;
    analyzed_ids.mark_news(&new_news_ids).await?;

    info!(papers = new_paper_ids.len(), news = new_news_ids.len(), "analyze task complete");
    Ok(TaskStatus::Success)
}

#[instrument(level = "info", skip(base_dir, settings, store))]
async fn run_summary(
    base_dir: &Path,
    settings: &Settings,
    date: NaiveDate,
    store: &dyn PromptStore,
) -> CoreResult<TaskStatus> {
    let papers: Vec<AnalyzedPaper> = read_json_lenient(&papers_path(base_dir, date)).await?.unwrap_or_default();
    let news: Vec<AnalyzedNews> = read_json_lenient(&news_path(base_dir, date)).await?.unwrap_or_default();

    let client = crate::llm::OpenAiCompatibleClient::new(
        settings.llm.provider.clone(),
        settings.llm.model.clone(),
        settings.llm.api_key.clone(),
    )
    .with_timeout(std::time::Duration::from_secs_f64(settings.advanced.llm_timeout))
    .with_retry_policy(crate::llm::RetryPolicy::new(
        settings.advanced.llm_max_retries,
        std::time::Duration::from_secs(1),
    ));
    let client: Option<&dyn crate::llm::LlmClient> =
        if settings.llm.api_key.trim().is_empty() { None } else { Some(&client) };

    generate_daily_report(base_dir, date, papers, news, settings, client, store).await?;
    Ok(TaskStatus::Success)
}

#[instrument(level = "info", skip(base_dir))]
async fn run_update_file_list(base_dir: &Path) -> CoreResult<TaskStatus> {
    rebuild_file_index(base_dir).await?;
    Ok(TaskStatus::Success)
}

#[instrument(level = "info", skip(base_dir, settings))]
async fn run_notify(base_dir: &Path, settings: &Settings, date: NaiveDate) -> CoreResult<TaskStatus> {
    let path = report_path(base_dir, date);
    let report: Option<crate::models::DailyReport> = read_json_lenient(&path).await?;
    let Some(report) = report else {
        warn!(path = %path.display(), "no report to notify about, skipping");
        return Ok(TaskStatus::NoNewContent);
    };

    let notifier = notifier_for(&settings.notification);
    let sent = notifier.send_daily_report(&report).await;
    notifier.close().await;
    info!(sent, "notify task complete (best-effort)");
    Ok(TaskStatus::Success)
}

/// Run one task, per spec §4.H's per-task pre/post contracts. `all` runs the
/// six tasks in table order; `arxiv` (and `news`) returning `NoNewContent`
/// does not abort the remaining phases.
#[instrument(level = "info", skip(settings, store), fields(task = ?task))]
pub async fn run_daily_task(
    task: PipelineTask,
    base_dir: &Path,
    settings: &Settings,
    store: &dyn PromptStore,
) -> CoreResult<TaskStatus> {
    let date = Utc::now().date_naive();

    match task {
        PipelineTask::Arxiv => run_arxiv(base_dir, settings, date).await,
        PipelineTask::News => run_news(base_dir, settings, date).await,
        PipelineTask::Analyze => run_analyze(base_dir, settings, date, store).await,
        PipelineTask::Summary => run_summary(base_dir, settings, date, store).await,
        PipelineTask::UpdateFileList => run_update_file_list(base_dir).await,
        PipelineTask::Notify => run_notify(base_dir, settings, date).await,
        PipelineTask::All => {
            if let Err(e) = run_arxiv(base_dir, settings, date).await {
                warn!(error = %e, "arxiv phase failed, continuing with remaining phases");
            }
            if let Err(e) = run_news(base_dir, settings, date).await {
                warn!(error = %e, "news phase failed, continuing with remaining phases");
            }
            run_analyze(base_dir, settings, date, store).await?;
            run_summary(base_dir, settings, date, store).await?;
            run_update_file_list(base_dir).await?;
            run_notify(base_dir, settings, date).await?;
            Ok(TaskStatus::Success)
        }
    }
}

/// Map a task failure to the exit code the CLI entry points use, per spec
/// §4.H: `config_error=1`, anything else `process_error=3`.
pub fn exit_code_for_error(error: &CoreError) -> i32 {
    match error {
        CoreError::ConfigInvalid(_) => 1,
        _ => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_exit_codes_are_zero() {
        assert_eq!(TaskStatus::Success.exit_code(), 0);
        assert_eq!(TaskStatus::NoNewContent.exit_code(), 0);
    }

    #[test]
    fn config_invalid_maps_to_exit_one() {
        assert_eq!(exit_code_for_error(&CoreError::ConfigInvalid("x".into())), 1);
    }

    #[test]
    fn other_errors_map_to_exit_three() {
        assert_eq!(exit_code_for_error(&CoreError::Other("x".into())), 3);
    }

    #[test]
    fn path_helpers_use_iso_date_filenames() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let base = Path::new("/tmp/data");
        assert_eq!(papers_path(base, date), base.join("papers/2025-06-01.json"));
        assert_eq!(news_path(base, date), base.join("news/2025-06-01.json"));
        assert_eq!(report_path(base, date), base.join("reports/2025-06-01.json"));
    }
}
