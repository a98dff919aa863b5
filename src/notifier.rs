//! Outbound notification contract, grounded on
//! `original_source/src/notifiers/{base,feishu}.py`. Best-effort per spec
//! §4.J/§7 `NotifierFailure`: failures are logged and swallowed, never
//! propagated past `send_daily_report`/`send_deep_analysis`.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::NotificationConfig;
use crate::models::DailyReport;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_daily_report(&self, report: &DailyReport) -> bool;

    async fn send_deep_analysis(&self, paper_id: &str, paper_title: &str, summary: &str, issue_url: &str) -> bool;

    /// Release any held resources (HTTP connections, sessions). No-op by
    /// default; overridden by stateful implementations.
    async fn close(&self) {}
}

/// No-op fallback used when no webhook is configured, matching the original's
/// `get_notifier()` returning a `DummyNotifier` when `feishu_webhook_url` is
/// unset.
pub struct DummyNotifier {
    reason: String,
}

impl DummyNotifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl Notifier for DummyNotifier {
    async fn send_daily_report(&self, _report: &DailyReport) -> bool {
        warn!(reason = %self.reason, "notifier not configured, skipping daily report notification");
        false
    }

    async fn send_deep_analysis(&self, _paper_id: &str, _paper_title: &str, _summary: &str, _issue_url: &str) -> bool {
        warn!(reason = %self.reason, "notifier not configured, skipping deep analysis notification");
        false
    }
}

/// Feishu (Lark) webhook notifier: posts an "interactive" message card.
/// Wire shape grounded on `FeishuNotifier._build_daily_card` /
/// `_build_analysis_card` in the original, translated into idiomatic
/// `serde_json::json!` builders rather than carried verbatim.
pub struct FeishuNotifier {
    http: reqwest::Client,
    webhook_url: String,
    max_retries: u32,
}

impl FeishuNotifier {
    pub fn new(config: &NotificationConfig) -> Option<Self> {
        let webhook_url = config.feishu_webhook_url.clone()?;
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs_f64(config.timeout))
            .build()
            .ok()?;
        Some(Self { http, webhook_url, max_retries: config.max_retries })
    }

    async fn send_card(&self, card: Value) -> bool {
        let body = json!({"msg_type": "interactive", "card": card});

        for attempt in 0..=self.max_retries {
            match self.http.post(&self.webhook_url).json(&body).send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        match response.json::<Value>().await {
                            Ok(parsed) if parsed.get("code").and_then(Value::as_i64) == Some(0) => {
                                info!("feishu notification sent");
                                return true;
                            }
                            Ok(parsed) => {
                                warn!(response = %parsed, "feishu API returned a non-zero code");
                            }
                            Err(e) => warn!(error = %e, "feishu response body was not valid JSON"),
                        }
                    } else {
                        warn!(status = %response.status(), "feishu API returned non-success status");
                    }
                }
                Err(e) => warn!(attempt, error = %e, "feishu webhook post failed"),
            }

            if attempt < self.max_retries {
                let delay = std::time::Duration::from_secs(2u64.pow(attempt));
                tokio::time::sleep(delay).await;
            }
        }

        warn!(max_retries = self.max_retries, "feishu notification failed after retries");
        false
    }

    fn build_daily_card(&self, report: &DailyReport) -> Value {
        let mut elements = vec![
            json!({"tag": "div", "text": {"tag": "lark_md", "content": report.summary}}),
            json!({"tag": "hr"}),
        ];

        if !report.category_summaries.is_empty() {
            for (category, summary) in &report.category_summaries {
                elements.push(json!({
                    "tag": "div",
                    "text": {"tag": "lark_md", "content": format!("**{category}**\n{summary}")},
                }));
            }
            elements.push(json!({"tag": "hr"}));
        }

        if !report.news_summary.is_empty() {
            elements.push(json!({
                "tag": "div",
                "text": {"tag": "lark_md", "content": format!("**News**\n{}", report.news_summary)},
            }));
        }

        json!({
            "header": {
                "title": {"tag": "plain_text", "content": format!("AI Insight Tracker daily report - {}", report.date)},
                "template": "blue",
            },
            "elements": elements,
        })
    }

    fn build_analysis_card(&self, paper_id: &str, paper_title: &str, summary: &str, issue_url: &str) -> Value {
        let truncated: String = summary.chars().take(500).collect();
        json!({
            "header": {
                "title": {"tag": "plain_text", "content": format!("Deep analysis complete - {paper_id}")},
                "template": "green",
            },
            "elements": [
                {"tag": "div", "text": {"tag": "lark_md", "content": format!("**Paper title**: {paper_title}")}},
                {"tag": "hr"},
                {"tag": "div", "text": {"tag": "lark_md", "content": format!("**Summary**:\n\n{truncated}")}},
                {"tag": "hr"},
                {"tag": "action", "actions": [
                    {"tag": "button", "text": {"tag": "plain_text", "content": "View full analysis"}, "type": "primary", "url": issue_url},
                    {"tag": "button", "text": {"tag": "plain_text", "content": "arXiv original"}, "type": "default", "url": format!("https://arxiv.org/abs/{paper_id}")},
                ]},
            ],
        })
    }
}

#[async_trait]
impl Notifier for FeishuNotifier {
    async fn send_daily_report(&self, report: &DailyReport) -> bool {
        let card = self.build_daily_card(report);
        self.send_card(card).await
    }

    async fn send_deep_analysis(&self, paper_id: &str, paper_title: &str, summary: &str, issue_url: &str) -> bool {
        let card = self.build_analysis_card(paper_id, paper_title, summary, issue_url);
        self.send_card(card).await
    }
}

/// Factory mirroring the original's `get_notifier()`: a configured Feishu
/// webhook yields [`FeishuNotifier`], otherwise a [`DummyNotifier`].
pub fn notifier_for(config: &NotificationConfig) -> Box<dyn Notifier> {
    match FeishuNotifier::new(config) {
        Some(notifier) => Box::new(notifier),
        None => Box::new(DummyNotifier::new("feishu_webhook_url not configured")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn sample_report() -> DailyReport {
        DailyReport {
            date: Utc::now().date_naive(),
            summary: "today: 3 papers, 2 news".into(),
            category_summaries: BTreeMap::new(),
            news_summary: String::new(),
            stats: crate::models::DailyStats::default(),
            generated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dummy_notifier_returns_false_and_never_panics() {
        let notifier = DummyNotifier::new("test");
        assert!(!notifier.send_daily_report(&sample_report()).await);
        assert!(!notifier.send_deep_analysis("2501.00001", "t", "s", "u").await);
    }

    #[test]
    fn notifier_for_falls_back_to_dummy_without_webhook() {
        let config = NotificationConfig::default();
        let _notifier = notifier_for(&config);
    }
}
