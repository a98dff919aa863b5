//! Async arXiv client: per-category pagination, client-side time-window
//! filtering, and exponential-backoff retry, grounded on
//! `AsyncArxivClient` in `original_source/src/data_fetchers/arxiv/client.py`.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::arxiv::atom::parse_atom_feed;
use crate::arxiv::gate::RateGate;
use crate::arxiv::query::{build_id_query, build_single_category_query};
use crate::config::ArxivConfig;
use crate::error::{CoreError, CoreResult};
use crate::models::Paper;

const USER_AGENT: &str = "ai-insight-tracker/0.1 (+https://github.com/graves/ai_insight_tracker)";

pub struct ArxivClient {
    http: Client,
    gate: RateGate,
    page_size: u32,
    max_pages: u32,
    max_retries: u32,
}

impl ArxivClient {
    pub fn new(cfg: &ArxivConfig) -> CoreResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs_f64(cfg.timeout))
            .build()
            .map_err(CoreError::Http)?;
        Ok(Self {
            http,
            gate: RateGate::new(Duration::from_secs_f64(cfg.request_delay)),
            page_size: cfg.max_results,
            max_pages: cfg.max_pages.max(1),
            max_retries: 3,
        })
    }

    /// Fetch the most recent papers across `categories` within `hours`,
    /// deduplicated by id and filtered to entries whose primary category is
    /// one of the requested categories.
    #[instrument(level = "info", skip(self, categories), fields(n = categories.len(), hours))]
    pub async fn fetch_recent_papers(&self, categories: &[String], hours: u32) -> Vec<Paper> {
        let mut all_papers = Vec::new();
        for category in categories {
            match self.fetch_category_paginated(category, hours).await {
                Ok(mut papers) => all_papers.append(&mut papers),
                Err(e) => warn!(category = %category, error = %e, "arxiv category fetch failed"),
            }
        }

        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for paper in all_papers {
            if seen.insert(paper.id.clone()) {
                unique.push(paper);
            }
        }

        let target: HashSet<&String> = categories.iter().collect();
        let cutoff = Utc::now() - chrono::Duration::hours(hours as i64);
        unique
            .into_iter()
            .filter(|p| target.contains(&p.primary_category))
            .filter(|p| p.latest_time() >= cutoff)
            .collect()
    }

    /// Fetch papers by explicit id (used by the deep-analysis "load one
    /// paper" path), via `id_list=`.
    #[instrument(level = "debug", skip(self, ids))]
    pub async fn fetch_by_ids(&self, ids: &[String]) -> CoreResult<Vec<Paper>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = build_id_query(ids);
        self.gate.run(self.fetch_and_parse(&url)).await
    }

    async fn fetch_category_paginated(&self, category: &str, hours: u32) -> CoreResult<Vec<Paper>> {
        let mut collected = Vec::new();
        let cutoff = Utc::now() - chrono::Duration::hours(hours as i64);
        let mut start = 0;

        for _page in 0..self.max_pages {
            let url = build_single_category_query(category, self.page_size, start);
            let page_papers = self.gate.run(self.fetch_and_parse(&url)).await?;
            if page_papers.is_empty() {
                break;
            }
            let page_len = page_papers.len() as u32;
            let oldest_in_page = page_papers.last().map(|p| p.latest_time());
            collected.extend(page_papers);

            if page_len < self.page_size {
                break;
            }
            if let Some(oldest) = oldest_in_page {
                if oldest < cutoff {
                    break;
                }
            }
            start += self.page_size;
        }

        info!(category, fetched = collected.len(), "arxiv category page fetch complete");
        Ok(collected)
    }

    async fn fetch_and_parse(&self, url: &str) -> CoreResult<Vec<Paper>> {
        let mut last_err: Option<CoreError> = None;

        for attempt in 0..self.max_retries {
            let response = match self.http.get(url).header("User-Agent", USER_AGENT).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_err = Some(CoreError::Http(e));
                    sleep(Duration::from_secs(2u64.pow(attempt))).await;
                    continue;
                }
            };

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                warn!("arxiv API rate limited (429), waiting 30s");
                sleep(Duration::from_secs(30)).await;
                continue;
            }
            if response.status().is_server_error() {
                let wait = 2u64.pow(attempt);
                warn!(status = %response.status(), wait, "arxiv API server error, retrying");
                sleep(Duration::from_secs(wait)).await;
                continue;
            }
            if !response.status().is_success() {
                return Err(CoreError::Other(format!("arxiv API returned {}", response.status())));
            }

            let body = response.text().await.map_err(CoreError::Http)?;
            return tokio::task::spawn_blocking(move || parse_atom_feed(&body))
                .await
                .map_err(|e| CoreError::Other(format!("parse task panicked: {e}")))?;
        }

        Err(last_err.unwrap_or_else(|| CoreError::Other("arxiv request failed after retries".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_client_builds_with_sane_config() {
        let cfg = ArxivConfig::default();
        assert!(ArxivClient::new(&cfg).is_ok());
    }
}
