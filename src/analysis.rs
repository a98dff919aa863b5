//! Generic LLM-bounded fan-out over light-analysis targets, per spec §4.E /
//! §9 "Dynamic schema → static sum types": a trait with associated types
//! `Input`/`Analysis`/`Output` plus the five methods the design notes name,
//! implemented once for both [`Paper`] and [`NewsItem`].

use futures::stream::{self, StreamExt};
use once_cell::sync::OnceCell;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::config::NotificationLanguage;
use crate::llm::{ChatMessage, LlmClient};
use crate::models::{
    AnalysisStatus, AnalyzedItem, AnalyzedNews, AnalyzedPaper, NewsAnalysis, NewsItem, Paper, PaperAnalysis,
};
use crate::prompts::{keys, render, PromptStore};

/// Process-wide semaphore shared across paper and news batches, so the
/// *total* number of in-flight LLM calls is bounded regardless of which
/// batch they come from (spec invariant 5 in §8).
static GLOBAL_LLM_SEMAPHORE: OnceCell<Semaphore> = OnceCell::new();

fn global_semaphore(max_concurrent: usize) -> &'static Semaphore {
    GLOBAL_LLM_SEMAPHORE.get_or_init(|| Semaphore::new(max_concurrent.max(1)))
}

/// The generic contract named in spec §9's design notes, implemented once
/// per concrete `(Input, Analysis)` pair.
pub trait AnalysisTarget: Sized {
    type Input: Clone + Send + Sync;
    type Analysis: serde::de::DeserializeOwned + serde::Serialize + Send;
    type Output: Send;

    fn prompt_key() -> (&'static str, &'static str);
    fn json_schema() -> Value;
    fn build_user_content(input: &Self::Input, store: &dyn PromptStore) -> String;
    fn system_content(language: NotificationLanguage, store: &dyn PromptStore) -> String;
    fn create_output(input: Self::Input) -> Self::Output;
    fn set_result(output: &mut Self::Output, analysis: Option<Self::Analysis>, error: Option<String>);
    fn item_id(input: &Self::Input) -> String;
}

pub struct PaperTarget;

impl AnalysisTarget for PaperTarget {
    type Input = Paper;
    type Analysis = PaperAnalysis;
    type Output = AnalyzedPaper;

    fn prompt_key() -> (&'static str, &'static str) {
        (keys::PAPER_LIGHT_SYSTEM, keys::PAPER_LIGHT_USER)
    }

    fn json_schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "overview": {"type": "string"},
                "motivation": {"type": "string"},
                "method": {"type": "string"},
                "result": {"type": "string"},
                "conclusion": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}},
            },
            "required": ["overview", "motivation", "method", "result", "conclusion", "tags"],
        })
    }

    fn build_user_content(input: &Paper, store: &dyn PromptStore) -> String {
        let (_, user_key) = Self::prompt_key();
        let template = store.get_or(user_key, "Title: {title}\n\nAbstract: {abstract}");
        render(&template, &[("title", &input.title), ("abstract", &input.abstract_text)])
    }

    fn system_content(language: NotificationLanguage, store: &dyn PromptStore) -> String {
        let (system_key, _) = Self::prompt_key();
        let template = store.get_or(system_key, "Summarize this paper in {language}.");
        let language = match language {
            NotificationLanguage::Zh => "Chinese",
            NotificationLanguage::En => "English",
        };
        render(&template, &[("language", language)])
    }

    fn create_output(input: Paper) -> AnalyzedPaper {
        AnalyzedItem::pending(input)
    }

    fn set_result(output: &mut AnalyzedPaper, analysis: Option<PaperAnalysis>, error: Option<String>) {
        match analysis {
            Some(analysis) => output.mark_success(analysis, chrono::Utc::now()),
            None => output.mark_failed(error.unwrap_or_else(|| "unknown error".to_string())),
        }
    }

    fn item_id(input: &Paper) -> String {
        input.id.clone()
    }
}

pub struct NewsTarget;

impl AnalysisTarget for NewsTarget {
    type Input = NewsItem;
    type Analysis = NewsAnalysis;
    type Output = AnalyzedNews;

    fn prompt_key() -> (&'static str, &'static str) {
        (keys::NEWS_LIGHT_SYSTEM, keys::NEWS_LIGHT_USER)
    }

    fn json_schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string"},
                "category": {"type": "string", "enum": ["AI", "LLM", "open-source", "product", "industry", "other"]},
                "sentiment": {"type": "string", "enum": ["positive", "neutral", "negative"]},
                "keywords": {"type": "array", "items": {"type": "string"}},
            },
            "required": ["summary", "category", "sentiment", "keywords"],
        })
    }

    fn build_user_content(input: &NewsItem, store: &dyn PromptStore) -> String {
        let (_, user_key) = Self::prompt_key();
        let template = store.get_or(user_key, "Title: {title}\nSource: {source}\nSummary: {summary}");
        render(
            &template,
            &[
                ("title", &input.title),
                ("source", &input.source_name),
                ("summary", input.summary.as_deref().unwrap_or("")),
            ],
        )
    }

    fn system_content(language: NotificationLanguage, store: &dyn PromptStore) -> String {
        let (system_key, _) = Self::prompt_key();
        let template = store.get_or(system_key, "Summarize this news item in {language}.");
        let language = match language {
            NotificationLanguage::Zh => "Chinese",
            NotificationLanguage::En => "English",
        };
        render(&template, &[("language", language)])
    }

    fn create_output(input: NewsItem) -> AnalyzedNews {
        AnalyzedItem::pending(input)
    }

    fn set_result(output: &mut AnalyzedNews, analysis: Option<NewsAnalysis>, error: Option<String>) {
        match analysis {
            Some(analysis) => output.mark_success(analysis, chrono::Utc::now()),
            None => output.mark_failed(error.unwrap_or_else(|| "unknown error".to_string())),
        }
    }

    fn item_id(input: &NewsItem) -> String {
        input.id.clone()
    }
}

/// Per-item contract (`analyze_one` in spec §4.E). Acquires the process-wide
/// semaphore, invokes `ChatStructured`, and never lets an error escape past
/// this function boundary: failures are recorded on `Output` instead.
#[instrument(level = "debug", skip(input, client, store), fields(id = %T::item_id(&input)))]
pub async fn analyze_one<T: AnalysisTarget>(
    input: T::Input,
    client: &dyn LlmClient,
    store: &dyn PromptStore,
    language: NotificationLanguage,
    max_concurrent: usize,
) -> T::Output {
    let semaphore = global_semaphore(max_concurrent);
    let _permit = semaphore.acquire().await.expect("semaphore never closed");

    let mut output = T::create_output(input.clone());
    let system = T::system_content(language, store);
    let user = T::build_user_content(&input, store);
    let messages = [ChatMessage::system(system), ChatMessage::user(user)];

    match client.chat_structured(&messages, &T::json_schema()).await {
        Ok(value) => match serde_json::from_value::<T::Analysis>(value) {
            Ok(analysis) => T::set_result(&mut output, Some(analysis), None),
            Err(e) => {
                warn!(id = %T::item_id(&input), error = %e, "structured analysis failed to deserialize");
                T::set_result(&mut output, None, Some(format!("JSON parse failed: {e}")));
            }
        },
        Err(e) => {
            warn!(id = %T::item_id(&input), error = %e, "analysis call failed");
            T::set_result(&mut output, None, Some(e.classify()));
        }
    }

    output
}

/// Batch contract: concurrent fan-out preserving input order, per spec
/// §4.E. Items whose id is already in `analyzed_ids` are skipped entirely
/// (the "incremental analysis policy" critical invariant) — callers should
/// pre-filter with [`filter_unanalyzed`] before calling this, but this
/// function also accepts pre-filtered input directly.
#[instrument(level = "info", skip(items, client, store), fields(n = items.len()))]
pub async fn analyze_batch<T: AnalysisTarget>(
    items: Vec<T::Input>,
    client: &dyn LlmClient,
    store: &dyn PromptStore,
    language: NotificationLanguage,
    max_concurrent: usize,
) -> Vec<T::Output> {
    let total = items.len();
    info!(total, "starting light-analysis batch");

    let results: Vec<T::Output> = stream::iter(items.into_iter().enumerate())
        .map(|(i, item)| async move {
            let output = analyze_one::<T>(item, client, store, language, max_concurrent).await;
            (i, output)
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Vec<_>>()
        .tap_sort_by_index();

    info!(total, "light-analysis batch complete");
    results
}

/// Filters `items` down to those whose id is not already present in
/// `analyzed_ids`, per the "incremental analysis policy" in spec §4.E.
pub fn filter_unanalyzed<T: AnalysisTarget>(
    items: Vec<T::Input>,
    analyzed_ids: &std::collections::HashSet<String>,
) -> Vec<T::Input> {
    items.into_iter().filter(|item| !analyzed_ids.contains(&T::item_id(item))).collect()
}

trait TapSortByIndex<O> {
    fn tap_sort_by_index(self) -> Vec<O>;
}

impl<O> TapSortByIndex<O> for Vec<(usize, O)> {
    fn tap_sort_by_index(mut self) -> Vec<O> {
        self.sort_by_key(|(i, _)| *i);
        self.into_iter().map(|(_, output)| output).collect()
    }
}

/// Computed once for logging/tests: the fraction of `outputs` whose status
/// is `success`, matching the original's `get_analysis_stats.success_rate`.
pub fn success_rate<T, A>(outputs: &[AnalyzedItem<T, A>]) -> f64 {
    if outputs.is_empty() {
        return 1.0;
    }
    let successes = outputs.iter().filter(|o| o.analysis_status == AnalysisStatus::Success).count();
    successes as f64 / outputs.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::prompts::FilePromptStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingClient {
        in_flight: Arc<AtomicU32>,
        max_seen: Arc<AtomicU32>,
        fail_ids: Vec<String>,
    }

    #[async_trait]
    impl LlmClient for CountingClient {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
            Ok(String::new())
        }

        async fn chat_structured(&self, messages: &[ChatMessage], _schema: &Value) -> Result<Value, LlmError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let user_text = &messages.last().unwrap().content;
            if self.fail_ids.iter().any(|id| user_text.contains(id)) {
                return Err(LlmError::Parse("induced failure".into()));
            }
            Ok(serde_json::json!({
                "overview": "o", "motivation": "m", "method": "me",
                "result": "r", "conclusion": "c", "tags": ["t"],
            }))
        }

        fn provider(&self) -> &str {
            "test"
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    fn sample_paper(id: &str) -> Paper {
        Paper {
            id: id.to_string(),
            title: format!("paper {id}"),
            abstract_text: "abstract text".into(),
            authors: vec![],
            categories: vec!["cs.AI".into()],
            primary_category: "cs.AI".into(),
            abs_url: String::new(),
            pdf_url: String::new(),
            published: chrono::Utc::now(),
            updated: None,
            comment: None,
        }
    }

    #[tokio::test]
    async fn analyze_one_marks_success_on_valid_response() {
        let client = CountingClient { in_flight: Arc::new(AtomicU32::new(0)), max_seen: Arc::new(AtomicU32::new(0)), fail_ids: vec![] };
        let store = FilePromptStore::new();
        let output = analyze_one::<PaperTarget>(sample_paper("p1"), &client, &store, NotificationLanguage::En, 5).await;
        assert!(output.is_analyzed());
    }

    #[tokio::test]
    async fn analyze_one_marks_failed_on_parse_error() {
        let client = CountingClient { in_flight: Arc::new(AtomicU32::new(0)), max_seen: Arc::new(AtomicU32::new(0)), fail_ids: vec!["p1".to_string()] };
        let store = FilePromptStore::new();
        let output = analyze_one::<PaperTarget>(sample_paper("p1"), &client, &store, NotificationLanguage::En, 5).await;
        assert!(!output.is_analyzed());
        assert!(output.analysis_error.unwrap().starts_with("JSON parse failed"));
    }

    #[tokio::test]
    async fn analyze_batch_preserves_input_order() {
        let client = CountingClient { in_flight: Arc::new(AtomicU32::new(0)), max_seen: Arc::new(AtomicU32::new(0)), fail_ids: vec![] };
        let store = FilePromptStore::new();
        let papers = vec![sample_paper("p1"), sample_paper("p2"), sample_paper("p3")];
        let outputs = analyze_batch::<PaperTarget>(papers, &client, &store, NotificationLanguage::En, 2).await;
        let ids: Vec<&str> = outputs.iter().map(|o| o.base.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn filter_unanalyzed_drops_known_ids() {
        let analyzed: std::collections::HashSet<String> = ["p1".to_string()].into_iter().collect();
        let papers = vec![sample_paper("p1"), sample_paper("p2")];
        let remaining = filter_unanalyzed::<PaperTarget>(papers, &analyzed);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "p2");
    }

    #[test]
    fn success_rate_half_on_mixed_batch() {
        let mut a = AnalyzedItem::pending(1u8);
        a.mark_success(PaperAnalysis { overview: "o".into(), motivation: "m".into(), method: "me".into(), result: "r".into(), conclusion: "c".into(), tags: vec![] }, chrono::Utc::now());
        let mut b: AnalyzedItem<u8, PaperAnalysis> = AnalyzedItem::pending(2u8);
        b.mark_failed("x".into());
        assert_eq!(success_rate(&[a, b]), 0.5);
    }
}
