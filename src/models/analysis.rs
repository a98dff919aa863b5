use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::news::NewsItem;
use super::paper::Paper;

/// Sentiment/category/status enums for news light-analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NewsSentiment {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NewsCategory {
    #[serde(rename = "AI")]
    Ai,
    #[serde(rename = "LLM")]
    Llm,
    #[serde(rename = "open-source")]
    OpenSource,
    Product,
    Industry,
    Other,
}

/// Structured LLM summary of a paper, produced by one `ChatStructured` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperAnalysis {
    pub overview: String,
    pub motivation: String,
    pub method: String,
    pub result: String,
    pub conclusion: String,
    pub tags: Vec<String>,
}

/// Structured LLM summary of a news item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsAnalysis {
    pub summary: String,
    pub category: NewsCategory,
    pub sentiment: NewsSentiment,
    pub keywords: Vec<String>,
}

/// Tagged union over the two light-analysis variants, used where generic
/// code needs to be agnostic to which kind of item it is analyzing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LightAnalysis {
    Paper(PaperAnalysis),
    News(NewsAnalysis),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Success,
    Failed,
}

/// A base item (`Paper` or `NewsItem`) enriched with light-analysis
/// bookkeeping. Generic so both kinds share the same merge-on-write and
/// serialization logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedItem<T, A> {
    #[serde(flatten)]
    pub base: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_analysis: Option<A>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<DateTime<Utc>>,
    pub analysis_status: AnalysisStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
}

pub type AnalyzedPaper = AnalyzedItem<Paper, PaperAnalysis>;
pub type AnalyzedNews = AnalyzedItem<NewsItem, NewsAnalysis>;

impl<T, A> AnalyzedItem<T, A> {
    pub fn pending(base: T) -> Self {
        Self {
            base,
            light_analysis: None,
            analyzed_at: None,
            analysis_status: AnalysisStatus::Pending,
            analysis_error: None,
        }
    }

    /// Invariant 1 in spec §3: `is_analyzed ⇔ status=success ∧ light_analysis≠null`.
    pub fn is_analyzed(&self) -> bool {
        self.analysis_status == AnalysisStatus::Success && self.light_analysis.is_some()
    }

    pub fn mark_success(&mut self, analysis: A, now: DateTime<Utc>) {
        self.light_analysis = Some(analysis);
        self.analyzed_at = Some(now);
        self.analysis_status = AnalysisStatus::Success;
        self.analysis_error = None;
    }

    pub fn mark_failed(&mut self, reason: String) {
        self.analysis_status = AnalysisStatus::Failed;
        self.analysis_error = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_analyzed_requires_both_status_and_payload() {
        let mut item: AnalyzedItem<u8, PaperAnalysis> = AnalyzedItem::pending(1);
        assert!(!item.is_analyzed());
        item.mark_success(
            PaperAnalysis {
                overview: "o".into(),
                motivation: "m".into(),
                method: "me".into(),
                result: "r".into(),
                conclusion: "c".into(),
                tags: vec!["a".into()],
            },
            Utc::now(),
        );
        assert!(item.is_analyzed());
    }

    #[test]
    fn mark_failed_clears_success_invariant() {
        let mut item: AnalyzedItem<u8, PaperAnalysis> = AnalyzedItem::pending(1);
        item.mark_failed("JSON parse failed: eof".into());
        assert!(!item.is_analyzed());
        assert_eq!(item.analysis_status, AnalysisStatus::Failed);
    }
}
