use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate counters and histograms computed from a day's analyzed items
/// (spec §4.G).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DailyStats {
    pub total_papers: usize,
    pub total_news: usize,
    pub papers_by_category: BTreeMap<String, usize>,
    pub news_by_category: BTreeMap<String, usize>,
    pub news_by_sentiment: BTreeMap<String, usize>,
    pub top_keywords: Vec<(String, usize)>,
}

impl DailyStats {
    /// Merge keyword counts and keep only the top 10 by frequency, ties
    /// broken by first-seen order.
    pub fn with_top_keywords(mut self, counts: BTreeMap<String, usize>) -> Self {
        let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
        pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        pairs.truncate(10);
        self.top_keywords = pairs;
        self
    }
}

/// The final synthesized daily report, written to `reports/{date}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub summary: String,
    pub category_summaries: BTreeMap<String, String>,
    pub news_summary: String,
    pub stats: DailyStats,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_keywords_truncates_and_orders_by_count() {
        let mut counts = BTreeMap::new();
        for (k, v) in [("llm", 5), ("rag", 9), ("agents", 3), ("diffusion", 9)] {
            counts.insert(k.to_string(), v);
        }
        let stats = DailyStats::default().with_top_keywords(counts);
        assert_eq!(stats.top_keywords[0], ("diffusion".to_string(), 9));
        assert_eq!(stats.top_keywords[1], ("rag".to_string(), 9));
        assert_eq!(stats.top_keywords.len(), 4);
    }
}
