//! `web_search` researcher tool, per spec §4.F: "runs up to 3 searches
//! concurrently against a primary backend; on backend-wide failure, falls
//! back to a secondary backend. Each query is bounded by a timeout."
//!
//! Two backends, selected by `SearchConfig.api`: Tavily (a REST API, used
//! when an API key is configured) and DuckDuckGo (HTML scrape of the
//! no-JS results page, grounded on `dashflow-duckduckgo`'s
//! `DuckDuckGoSearchTool` for the selector shape). Whichever is not
//! primary becomes the fallback.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

use crate::config::{SearchApi, SearchConfig};
use crate::error::{CoreError, CoreResult};

const DUCKDUCKGO_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, query: &str, max_results: u32, timeout: Duration) -> CoreResult<String>;
}

pub struct TavilySearchBackend {
    client: reqwest::Client,
    api_key: String,
}

impl TavilySearchBackend {
    pub fn new(api_key: String) -> Self {
        Self { client: reqwest::Client::new(), api_key }
    }
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl SearchBackend for TavilySearchBackend {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: u32, timeout: Duration) -> CoreResult<String> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
        });
        let response = tokio::time::timeout(
            timeout,
            self.client.post("https://api.tavily.com/search").json(&body).send(),
        )
        .await
        .map_err(|_| CoreError::Other(format!("tavily search for '{query}' timed out")))?
        .map_err(CoreError::Http)?;

        if !response.status().is_success() {
            return Err(CoreError::Other(format!("tavily search returned {}", response.status())));
        }
        let parsed: TavilyResponse = response.json().await.map_err(CoreError::Http)?;
        Ok(format_results(query, parsed.results.into_iter().map(|r| (r.title, r.url, r.content))))
    }
}

pub struct DuckDuckGoSearchBackend {
    client: reqwest::Client,
}

impl Default for DuckDuckGoSearchBackend {
    fn default() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoSearchBackend {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: u32, timeout: Duration) -> CoreResult<String> {
        let url = format!("https://html.duckduckgo.com/html/?q={}", urlencoding::encode(query));
        let response = tokio::time::timeout(
            timeout,
            self.client.get(&url).header("User-Agent", DUCKDUCKGO_USER_AGENT).send(),
        )
        .await
        .map_err(|_| CoreError::Other(format!("duckduckgo search for '{query}' timed out")))?
        .map_err(CoreError::Http)?;

        if !response.status().is_success() {
            return Err(CoreError::Other(format!("duckduckgo search returned {}", response.status())));
        }
        let html = response.text().await.map_err(CoreError::Http)?;
        let max_results = max_results as usize;
        let results = tokio::task::spawn_blocking(move || parse_duckduckgo_results(&html, max_results))
            .await
            .map_err(|e| CoreError::Other(format!("duckduckgo parse task panicked: {e}")))?;
        Ok(format_results(query, results.into_iter()))
    }
}

fn parse_duckduckgo_results(html: &str, max_results: usize) -> Vec<(String, String, String)> {
    let document = Html::parse_document(html);
    let Ok(result_selector) = Selector::parse("div.result") else { return Vec::new() };
    let Ok(title_selector) = Selector::parse("a.result__a") else { return Vec::new() };
    let Ok(snippet_selector) = Selector::parse("a.result__snippet") else { return Vec::new() };

    document
        .select(&result_selector)
        .take(max_results)
        .map(|result| {
            let title = result
                .select(&title_selector)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            let url = result
                .select(&title_selector)
                .next()
                .and_then(|el| el.value().attr("href"))
                .unwrap_or_default()
                .to_string();
            let snippet = result
                .select(&snippet_selector)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            (title, url, snippet)
        })
        .filter(|(title, url, _)| !title.is_empty() && !url.is_empty())
        .collect()
}

fn format_results(query: &str, results: impl Iterator<Item = (String, String, String)>) -> String {
    let entries: Vec<String> = results
        .map(|(title, url, snippet)| format!("[{title}]\nURL: {url}\nSnippet: {snippet}"))
        .collect();
    if entries.is_empty() {
        format!("No search results found for query: '{query}'")
    } else {
        format!("Search results for '{query}' ({} found):\n\n{}", entries.len(), entries.join("\n\n"))
    }
}

fn backend_for(api: SearchApi, config: &SearchConfig) -> Box<dyn SearchBackend> {
    match api {
        SearchApi::Tavily => Box::new(TavilySearchBackend::new(config.tavily_api_key.clone().unwrap_or_default())),
        SearchApi::Duckduckgo => Box::new(DuckDuckGoSearchBackend::default()),
    }
}

fn secondary_api(primary: SearchApi) -> SearchApi {
    match primary {
        SearchApi::Tavily => SearchApi::Duckduckgo,
        SearchApi::Duckduckgo => SearchApi::Tavily,
    }
}

/// Run `queries` (at most 3, per the tool contract) concurrently against the
/// configured primary backend. If every query in the batch errors, the whole
/// batch is retried once against the secondary backend before giving up.
#[instrument(level = "debug", skip(config), fields(n = queries.len()))]
pub async fn web_search(queries: &[String], config: &SearchConfig) -> String {
    let timeout = Duration::from_secs_f64(config.timeout);
    let primary = backend_for(config.api, config);

    let primary_results = run_batch(primary.as_ref(), queries, config.max_results, timeout).await;
    if primary_results.iter().any(|r| r.is_ok()) {
        return join_batch(queries, primary_results);
    }

    warn!(backend = primary.name(), "search backend failed for every query, falling back");
    let secondary = backend_for(secondary_api(config.api), config);
    let secondary_results = run_batch(secondary.as_ref(), queries, config.max_results, timeout).await;
    join_batch(queries, secondary_results)
}

async fn run_batch(
    backend: &dyn SearchBackend,
    queries: &[String],
    max_results: u32,
    timeout: Duration,
) -> Vec<CoreResult<String>> {
    join_all(queries.iter().map(|q| backend.search(q, max_results, timeout))).await
}

fn join_batch(queries: &[String], results: Vec<CoreResult<String>>) -> String {
    queries
        .iter()
        .zip(results)
        .map(|(query, result)| match result {
            Ok(text) => text,
            Err(e) => format!("Search for '{query}' failed: {e}"),
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"<html><body>
        <div class="result">
            <a class="result__a" href="https://example.com/first">First Result</a>
            <a class="result__snippet">A snippet about the first result.</a>
        </div>
        <div class="result">
            <a class="result__a" href="https://example.com/second">Second Result</a>
            <a class="result__snippet">Another snippet.</a>
        </div>
    </body></html>"#;

    #[test]
    fn parses_duckduckgo_result_divs() {
        let results = parse_duckduckgo_results(SAMPLE_HTML, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "First Result");
        assert_eq!(results[0].1, "https://example.com/first");
        assert_eq!(results[0].2, "A snippet about the first result.");
    }

    #[test]
    fn respects_max_results_cap() {
        let results = parse_duckduckgo_results(SAMPLE_HTML, 1);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn empty_results_render_as_no_results_message() {
        let formatted = format_results("nothing here", std::iter::empty());
        assert!(formatted.contains("No search results found"));
    }

    #[test]
    fn secondary_api_is_the_opposite_of_primary() {
        assert_eq!(secondary_api(SearchApi::Tavily), SearchApi::Duckduckgo);
        assert_eq!(secondary_api(SearchApi::Duckduckgo), SearchApi::Tavily);
    }
}
