//! End-to-end scenario tests exercising the public persistence/analysis/report
//! API together, as a pipeline run would, without touching the network.
//!
//! These mirror the daily happy path, resumable-analyze, and cross-day news
//! dedup scenarios: everything the CLI binaries wire up at runtime, minus the
//! real `ArxivClient`/`PlaywrightPageFetcher`/`OpenAiCompatibleClient`.

use std::collections::HashSet;
use std::path::PathBuf;

use ai_insight_tracker::analysis::{analyze_batch, filter_unanalyzed, PaperTarget};
use ai_insight_tracker::config::NotificationLanguage;
use ai_insight_tracker::error::LlmError;
use ai_insight_tracker::ids::IdTracker;
use ai_insight_tracker::llm::{ChatMessage, LlmClient};
use ai_insight_tracker::models::{AnalyzedPaper, NewsItem, Paper};
use ai_insight_tracker::persistence::day_files::merge_day_file;
use ai_insight_tracker::persistence::file_index::rebuild_file_index;
use ai_insight_tracker::persistence::read_json_lenient;
use ai_insight_tracker::prompts::FilePromptStore;
use ai_insight_tracker::report::generate_daily_report;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value;

struct TempDir(PathBuf);

impl TempDir {
    fn new(label: &str) -> Self {
        let mut path = std::env::temp_dir();
        path.push(format!("ai_insight_tracker-itest-{label}-{}", std::process::id()));
        std::fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    fn path(&self) -> &std::path::Path {
        &self.0
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn paper(id: &str, hours_ago: i64) -> Paper {
    Paper {
        id: id.to_string(),
        title: format!("paper {id}"),
        abstract_text: "abstract text".into(),
        authors: vec!["A. Author".into()],
        categories: vec!["cs.AI".into()],
        primary_category: "cs.AI".into(),
        abs_url: format!("https://arxiv.org/abs/{id}"),
        pdf_url: format!("https://arxiv.org/pdf/{id}"),
        published: Utc::now() - chrono::Duration::hours(hours_ago),
        updated: None,
        comment: None,
    }
}

fn news_item(id: &str, weight: f32) -> NewsItem {
    NewsItem {
        id: id.to_string(),
        title: format!("news {id}"),
        url: format!("https://example.com/{id}"),
        source_name: "Example".into(),
        source_category: "general".into(),
        language: "en".into(),
        published: Utc::now(),
        weight,
        summary: None,
        content: None,
        fetch_type: ai_insight_tracker::models::FetchType::Feed,
        company: None,
    }
}

/// Always succeeds with a fixed light-analysis payload, so `analyze_batch`
/// can run end to end without a real LLM provider.
struct StubClient;

#[async_trait]
impl LlmClient for StubClient {
    async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        Ok("a stubbed prose summary".to_string())
    }

    async fn chat_structured(&self, _messages: &[ChatMessage], _schema: &Value) -> Result<Value, LlmError> {
        Ok(serde_json::json!({
            "overview": "o", "motivation": "m", "method": "me",
            "result": "r", "conclusion": "c", "tags": ["rag"],
        }))
    }

    fn provider(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub-model"
    }
}

/// S1 (tiny budget): ingest three papers and two news items, analyze them
/// all, generate a report, and rebuild the file index — each step through
/// the same functions `pipeline::run_daily_task` calls internally.
#[tokio::test]
async fn daily_happy_path_produces_a_complete_report() {
    let dir = TempDir::new("s1");
    let date = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
    let papers_path = dir.path().join("papers").join(format!("{date}.json"));
    let news_path = dir.path().join("news").join(format!("{date}.json"));

    let incoming = vec![paper("2501.00001", 1), paper("2501.00002", 2), paper("2501.00003", 3)];
    merge_day_file::<_, ai_insight_tracker::models::PaperAnalysis>(&papers_path, incoming).await.unwrap();
    merge_day_file::<_, ai_insight_tracker::models::NewsAnalysis>(
        &news_path,
        vec![news_item("n1", 0.8), news_item("n2", 0.3)],
    )
    .await
    .unwrap();

    let client = StubClient;
    let store = FilePromptStore::new();
    let papers: Vec<AnalyzedPaper> = read_json_lenient(&papers_path).await.unwrap().unwrap();
    let base_papers: Vec<Paper> = papers.iter().map(|p| p.base.clone()).collect();
    let analyzed = analyze_batch::<PaperTarget>(base_papers, &client, &store, NotificationLanguage::En, 2).await;
    ai_insight_tracker::persistence::write_json_atomic(&papers_path, &analyzed).await.unwrap();

    let news: Vec<ai_insight_tracker::models::AnalyzedNews> = read_json_lenient(&news_path).await.unwrap().unwrap();

    let report = generate_daily_report(
        dir.path(),
        date,
        analyzed,
        news,
        &ai_insight_tracker::config::Settings::default(),
        Some(&client as &dyn LlmClient),
        &store,
    )
    .await
    .unwrap();

    assert_eq!(report.stats.total_papers, 3);
    assert_eq!(report.stats.total_news, 2);
    assert!(!report.summary.is_empty());

    let index = rebuild_file_index(dir.path()).await.unwrap();
    assert_eq!(index.papers.first().map(String::as_str), Some(&*format!("{date}.json")));
    assert_eq!(index.reports.first().map(String::as_str), Some(&*format!("{date}.json")));
}

/// S2 (resumable analyze): once a paper is marked analyzed, a second
/// `filter_unanalyzed` pass must exclude it even though it's still present
/// in the day file.
#[tokio::test]
async fn resumable_analyze_skips_already_analyzed_ids() {
    let dir = TempDir::new("s2");
    let tracker = IdTracker::analyzed(dir.path().join("analyzed_ids.json"));
    tracker.mark_papers(&["2501.00001".to_string(), "2501.00002".to_string()]).await.unwrap();

    let analyzed_ids: HashSet<String> = tracker.paper_ids().await.unwrap();
    let all = vec![paper("2501.00001", 1), paper("2501.00002", 2), paper("2501.00003", 3)];
    let remaining = filter_unanalyzed::<PaperTarget>(all, &analyzed_ids);

    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "2501.00003");
}

/// S6 (news dedup across days): an id already present in the fetched
/// tracker must not be re-emitted by the post-merge pipeline.
#[tokio::test]
async fn news_post_merge_pipeline_drops_already_fetched_ids() {
    let dir = TempDir::new("s6");
    let fetched = IdTracker::fetched(dir.path().join("fetched_ids.json"));
    fetched.mark_news(&["n1".to_string()]).await.unwrap();

    let incoming = vec![news_item("n1", 0.5), news_item("n2", 0.5)];
    let result = ai_insight_tracker::news::post_merge_pipeline(incoming, 25, &fetched).await;

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].id, "n2");
}
