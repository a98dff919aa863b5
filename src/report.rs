//! Daily Report Generator, per spec §4.G: sort the day's analyzed items,
//! compute `DailyStats`, generate prose summaries via LLM (falling back to a
//! template on any failure), assemble a `DailyReport`, and persist it.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, Utc};
use futures::future::try_join_all;
use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::error::CoreResult;
use crate::llm::{ChatMessage, LlmClient};
use crate::models::{
    AnalysisStatus, AnalyzedNews, AnalyzedPaper, DailyReport, DailyStats, NewsCategory, NewsSentiment,
};
use crate::persistence::file_index::rebuild_file_index;
use crate::persistence::write_json_atomic;
use crate::prompts::{keys, render, PromptStore};

fn news_category_label(category: NewsCategory) -> &'static str {
    match category {
        NewsCategory::Ai => "AI",
        NewsCategory::Llm => "LLM",
        NewsCategory::OpenSource => "open-source",
        NewsCategory::Product => "product",
        NewsCategory::Industry => "industry",
        NewsCategory::Other => "other",
    }
}

fn news_sentiment_label(sentiment: NewsSentiment) -> &'static str {
    match sentiment {
        NewsSentiment::Positive => "positive",
        NewsSentiment::Neutral => "neutral",
        NewsSentiment::Negative => "negative",
    }
}

/// Sort papers `(analysis_status=success first, published desc)`, per spec §4.G step 1.
fn sort_papers(papers: &mut [AnalyzedPaper]) {
    papers.sort_by(|a, b| {
        let rank = |p: &AnalyzedPaper| p.analysis_status != AnalysisStatus::Success;
        rank(a).cmp(&rank(b)).then_with(|| b.base.published.cmp(&a.base.published))
    });
}

/// Sort news `(success first, weight desc, published desc)`.
fn sort_news(news: &mut [AnalyzedNews]) {
    news.sort_by(|a, b| {
        let rank = |n: &AnalyzedNews| n.analysis_status != AnalysisStatus::Success;
        rank(a)
            .cmp(&rank(b))
            .then_with(|| b.base.weight.total_cmp(&a.base.weight))
            .then_with(|| b.base.published.cmp(&a.base.published))
    });
}

fn compute_stats(papers: &[AnalyzedPaper], news: &[AnalyzedNews]) -> DailyStats {
    let mut papers_by_category = BTreeMap::new();
    for paper in papers {
        *papers_by_category.entry(paper.base.primary_category.clone()).or_insert(0) += 1;
    }

    let mut news_by_category = BTreeMap::new();
    let mut news_by_sentiment = BTreeMap::new();
    for item in news {
        let category = match &item.light_analysis {
            Some(analysis) => news_category_label(analysis.category).to_string(),
            None => item.base.source_category.clone(),
        };
        *news_by_category.entry(category).or_insert(0) += 1;
        if let Some(analysis) = &item.light_analysis {
            *news_by_sentiment.entry(news_sentiment_label(analysis.sentiment).to_string()).or_insert(0) += 1;
        }
    }

    let mut keyword_counts: BTreeMap<String, usize> = BTreeMap::new();
    for paper in papers {
        if let Some(analysis) = &paper.light_analysis {
            for tag in &analysis.tags {
                *keyword_counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
    }
    for item in news {
        if let Some(analysis) = &item.light_analysis {
            for keyword in &analysis.keywords {
                *keyword_counts.entry(keyword.clone()).or_insert(0) += 1;
            }
        }
    }

    DailyStats {
        total_papers: papers.len(),
        total_news: news.len(),
        papers_by_category,
        news_by_category,
        news_by_sentiment,
        top_keywords: Vec::new(),
    }
    .with_top_keywords(keyword_counts)
}

async fn category_summary(
    category: &str,
    papers: &[AnalyzedPaper],
    client: &dyn LlmClient,
    store: &dyn PromptStore,
) -> Result<String, crate::error::LlmError> {
    let listing = papers
        .iter()
        .filter(|p| p.base.primary_category == category)
        .map(|p| format!("- {}", p.base.title))
        .collect::<Vec<_>>()
        .join("\n");

    let system = store.get_or(keys::REPORT_SYSTEM, "You are an editor producing a concise daily AI research digest summary.");
    let template = store.get_or(
        keys::CATEGORY_SUMMARY_USER,
        "Category: {category}\n\nPapers:\n{papers}\n\nWrite a 200-300 character prose summary of today's activity in this category.",
    );
    let user = render(&template, &[("category", category), ("papers", &listing)]);

    client.chat(&[ChatMessage::system(system), ChatMessage::user(user)]).await
}

async fn news_summary(
    news: &[AnalyzedNews],
    client: &dyn LlmClient,
    store: &dyn PromptStore,
) -> Result<String, crate::error::LlmError> {
    let listing = news
        .iter()
        .filter_map(|n| n.light_analysis.as_ref().map(|a| format!("- {}: {}", n.base.title, a.summary)))
        .collect::<Vec<_>>()
        .join("\n");

    let system = store.get_or(keys::REPORT_SYSTEM, "You are an editor producing a concise daily AI research digest summary.");
    let template = store.get_or(
        keys::NEWS_SUMMARY_USER,
        "News items:\n{news}\n\nWrite a concise summary of today's AI-industry news.",
    );
    let user = render(&template, &[("news", &listing)]);

    client.chat(&[ChatMessage::system(system), ChatMessage::user(user)]).await
}

async fn daily_summary(
    category_summaries: &BTreeMap<String, String>,
    news_summary: &str,
    client: &dyn LlmClient,
    store: &dyn PromptStore,
) -> Result<String, crate::error::LlmError> {
    let joined = category_summaries
        .iter()
        .map(|(category, summary)| format!("{category}: {summary}"))
        .collect::<Vec<_>>()
        .join("\n");

    let system = store.get_or(keys::REPORT_SYSTEM, "You are an editor producing a concise daily AI research digest summary.");
    let template = store.get_or(
        keys::DAILY_SUMMARY_USER,
        "Category summaries:\n{category_summaries}\n\nNews summary:\n{news_summary}\n\nSynthesize a single daily summary.",
    );
    let user = render(&template, &[("category_summaries", &joined), ("news_summary", news_summary)]);

    client.chat(&[ChatMessage::system(system), ChatMessage::user(user)]).await
}

/// Attempt the full LLM summary pipeline; any single failure aborts the
/// whole stage, matching spec §4.G's "fails end-to-end" fallback trigger.
async fn try_llm_summaries(
    papers: &[AnalyzedPaper],
    news: &[AnalyzedNews],
    target_categories: &[String],
    client: &dyn LlmClient,
    store: &dyn PromptStore,
) -> Result<(BTreeMap<String, String>, String, String), crate::error::LlmError> {
    let categories_with_papers: Vec<&String> = target_categories
        .iter()
        .filter(|c| papers.iter().any(|p| &p.base.primary_category == *c))
        .collect();

    let (category_results, news_text) = tokio::try_join!(
        try_join_all(categories_with_papers.iter().map(|c| category_summary(c, papers, client, store))),
        news_summary(news, client, store),
    )?;

    let category_summaries: BTreeMap<String, String> = categories_with_papers
        .into_iter()
        .cloned()
        .zip(category_results)
        .collect();

    let summary = daily_summary(&category_summaries, &news_text, client, store).await?;
    Ok((category_summaries, news_text, summary))
}

/// Template fallback: "today: N papers, M news; top categories: ...; top keywords: ...".
fn template_summary(stats: &DailyStats) -> String {
    let mut top_categories: Vec<(&String, &usize)> = stats.papers_by_category.iter().collect();
    top_categories.sort_by(|a, b| b.1.cmp(a.1));
    let categories = top_categories
        .iter()
        .take(5)
        .map(|(name, count)| format!("{name} ({count})"))
        .collect::<Vec<_>>()
        .join(", ");
    let keywords = stats.top_keywords.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>().join(", ");

    format!(
        "today: {} papers, {} news; top categories: {}; top keywords: {}",
        stats.total_papers, stats.total_news, categories, keywords
    )
}

/// Generate and persist the daily report for `date`, per spec §4.G. `client`
/// is `None` when the LLM is disabled in configuration, triggering the
/// template fallback immediately rather than attempting any call.
#[instrument(level = "info", skip(papers, news, settings, client, store), fields(date = %date))]
pub async fn generate_daily_report(
    base_dir: &Path,
    date: NaiveDate,
    mut papers: Vec<AnalyzedPaper>,
    mut news: Vec<AnalyzedNews>,
    settings: &Settings,
    client: Option<&dyn LlmClient>,
    store: &dyn PromptStore,
) -> CoreResult<DailyReport> {
    sort_papers(&mut papers);
    sort_news(&mut news);
    let stats = compute_stats(&papers, &news);

    let (category_summaries, news_summary_text, summary) = match client {
        Some(client) => match try_llm_summaries(&papers, &news, &settings.arxiv.categories, client, store).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "daily summary LLM stage failed end-to-end, falling back to template");
                (BTreeMap::new(), String::new(), template_summary(&stats))
            }
        },
        None => (BTreeMap::new(), String::new(), template_summary(&stats)),
    };

    let report = DailyReport {
        date,
        summary,
        category_summaries,
        news_summary: news_summary_text,
        stats,
        generated_at: Utc::now(),
    };

    let report_path = base_dir.join("reports").join(format!("{date}.json"));
    write_json_atomic(&report_path, &report).await?;
    rebuild_file_index(base_dir).await?;
    info!(path = %report_path.display(), "daily report written");

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::models::{AnalyzedItem, FetchType, NewsAnalysis, NewsItem, Paper, PaperAnalysis};
    use crate::prompts::FilePromptStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::Value;

    fn paper(id: &str, category: &str, hours_ago: i64, analyzed: bool) -> AnalyzedPaper {
        let base = Paper {
            id: id.to_string(),
            title: format!("paper {id}"),
            abstract_text: "abstract".into(),
            authors: vec![],
            categories: vec![category.to_string()],
            primary_category: category.to_string(),
            abs_url: String::new(),
            pdf_url: String::new(),
            published: Utc::now() - Duration::hours(hours_ago),
            updated: None,
            comment: None,
        };
        let mut item = AnalyzedItem::pending(base);
        if analyzed {
            item.mark_success(
                PaperAnalysis {
                    overview: "o".into(),
                    motivation: "m".into(),
                    method: "me".into(),
                    result: "r".into(),
                    conclusion: "c".into(),
                    tags: vec!["rag".into()],
                },
                Utc::now(),
            );
        }
        item
    }

    fn news(id: &str, weight: f32) -> AnalyzedNews {
        let base = NewsItem {
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
            fetch_type: FetchType::Feed,
            company: None,
        };
        let mut item: AnalyzedNews = AnalyzedItem::pending(base);
        item.mark_success(
            NewsAnalysis {
                summary: "summary".into(),
                category: NewsCategory::Ai,
                sentiment: NewsSentiment::Neutral,
                keywords: vec!["llm".into()],
            },
            Utc::now(),
        );
        item
    }

    #[test]
    fn sort_papers_puts_success_first_then_published_desc() {
        let mut papers = vec![paper("old-success", "cs.AI", 10, true), paper("new-pending", "cs.AI", 1, false)];
        sort_papers(&mut papers);
        assert_eq!(papers[0].base.id, "old-success");
    }

    #[test]
    fn sort_news_orders_by_weight_desc() {
        let mut items = vec![news("low", 0.1), news("high", 0.9)];
        sort_news(&mut items);
        assert_eq!(items[0].base.id, "high");
    }

    #[test]
    fn compute_stats_counts_categories_and_keywords() {
        let papers = vec![paper("p1", "cs.AI", 1, true), paper("p2", "cs.AI", 2, false)];
        let news_items = vec![news("n1", 0.5)];
        let stats = compute_stats(&papers, &news_items);
        assert_eq!(stats.total_papers, 2);
        assert_eq!(stats.papers_by_category.get("cs.AI"), Some(&2));
        assert_eq!(stats.news_by_category.get("AI"), Some(&1));
        assert!(stats.top_keywords.iter().any(|(k, _)| k == "rag"));
        assert!(stats.top_keywords.iter().any(|(k, _)| k == "llm"));
    }

    #[test]
    fn template_summary_mentions_totals_and_keywords() {
        let papers = vec![paper("p1", "cs.AI", 1, true)];
        let news_items = vec![news("n1", 0.5)];
        let stats = compute_stats(&papers, &news_items);
        let text = template_summary(&stats);
        assert!(text.contains("1 papers"));
        assert!(text.contains("1 news"));
        assert!(text.contains("cs.AI"));
    }

    struct FailingClient;

    #[async_trait]
    impl LlmClient for FailingClient {
        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
            Err(LlmError::Other("induced failure".into()))
        }
        async fn chat_structured(&self, _messages: &[ChatMessage], _schema: &Value) -> Result<Value, LlmError> {
            Err(LlmError::Other("induced failure".into()))
        }
        fn provider(&self) -> &str {
            "test"
        }
        fn model(&self) -> &str {
            "test-model"
        }
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_template_summary() {
        let store = FilePromptStore::new();
        let client = FailingClient;
        let papers = vec![paper("p1", "cs.AI", 1, true)];
        let news_items = vec![news("n1", 0.5)];
        let result = try_llm_summaries(&papers, &news_items, &["cs.AI".to_string()], &client, &store).await;
        assert!(result.is_err());
    }
}
