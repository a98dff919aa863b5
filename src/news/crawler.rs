//! Crawler family: headless-browser listing fetch + CSS extraction schema,
//! per spec §4.C. Two independent semaphores bound listing vs. detail-page
//! concurrency so a detail-page fetch can never nest inside (and deadlock
//! against) the listing semaphore — grounded on
//! `original_source/src/data_fetchers/crawler/{base,client}.py`'s separate
//! `_listing_semaphore`/`_detail_semaphore`.
//!
//! `PageFetcher` is a trait so extraction logic can be unit-tested against
//! static HTML without spinning up a real browser; [`PlaywrightPageFetcher`]
//! is the production implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use tokio::sync::Semaphore;
use tracing::{instrument, warn};
use url::Url;

use crate::config::NewsConfig;
use crate::error::{CoreError, CoreResult};
use crate::models::{FetchType, NewsItem};
use crate::news::sources::NewsSourceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Attribute,
}

#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub name: &'static str,
    pub selector: &'static str,
    pub kind: FieldKind,
    pub attribute: Option<&'static str>,
}

/// `{baseSelector, fields: [{name, selector, type, attribute?}]}` from spec
/// §4.C, one instance declared per listing page shape.
#[derive(Debug, Clone)]
pub struct CssExtractionSchema {
    pub base_selector: &'static str,
    pub fields: &'static [FieldSchema],
}

/// Optional detail-page enrichment schema: the selector whose text becomes
/// `NewsItem.content`.
#[derive(Debug, Clone)]
pub struct DetailPageSchema {
    pub content_selector: &'static str,
}

/// One named site extractor: listing schema, optional pre-fetch JS to
/// dismiss overlays / trigger lazy load, optional detail enrichment, and a
/// date-parsing strategy for whatever format that site's listing emits.
pub struct SiteExtractor {
    pub name: &'static str,
    pub listing: CssExtractionSchema,
    pub pre_fetch_script: Option<&'static str>,
    pub detail: Option<DetailPageSchema>,
    pub parse_date: fn(&str) -> Option<DateTime<Utc>>,
}

/// Fetches fully-rendered HTML via a headless browser context.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_rendered_html(&self, url: &str, pre_fetch_script: Option<&str>) -> CoreResult<String>;
}

/// Extract rows of `{field_name -> value}` from `html` per `schema`. Relative
/// `href`/`src` attribute values are resolved against `base_url`.
pub fn extract_rows(html: &str, schema: &CssExtractionSchema, base_url: &str) -> Vec<HashMap<String, String>> {
    let document = Html::parse_document(html);
    let Ok(base_selector) = Selector::parse(schema.base_selector) else {
        warn!(selector = schema.base_selector, "invalid base selector");
        return Vec::new();
    };

    let mut rows = Vec::new();
    for base_element in document.select(&base_selector) {
        let mut row = HashMap::new();
        for field in schema.fields {
            let Ok(field_selector) = Selector::parse(field.selector) else {
                continue;
            };
            let Some(matched) = base_element.select(&field_selector).next() else {
                continue;
            };
            let value = match field.kind {
                FieldKind::Text => matched.text().collect::<Vec<_>>().join(" ").trim().to_string(),
                FieldKind::Attribute => {
                    let attr = field.attribute.unwrap_or("href");
                    matched.value().attr(attr).map(|v| resolve_url(base_url, v)).unwrap_or_default()
                }
            };
            if !value.is_empty() {
                row.insert(field.name.to_string(), value);
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }
    rows
}

fn resolve_url(base_url: &str, href: &str) -> String {
    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href.to_string(),
    }
}

fn row_to_news_item(
    row: &HashMap<String, String>,
    source: &NewsSourceConfig,
    extractor: &SiteExtractor,
) -> Option<NewsItem> {
    let title = row.get("title")?.clone();
    let url = row.get("url").or_else(|| row.get("link"))?.clone();
    if title.is_empty() || url.is_empty() {
        return None;
    }

    let published = row
        .get("date")
        .or_else(|| row.get("published"))
        .and_then(|raw| (extractor.parse_date)(raw))
        .unwrap_or_else(Utc::now);

    Some(NewsItem {
        id: NewsItem::id_from_url(&url),
        title,
        url,
        source_name: source.name.clone(),
        source_category: source.company.clone(),
        language: source.language.clone(),
        published,
        weight: source.weight,
        summary: row.get("summary").cloned(),
        content: None,
        fetch_type: FetchType::Crawler,
        company: Some(source.company.clone()),
    })
}

/// Crawl one source: fetch the listing page (bounded by `listing_semaphore`),
/// extract rows, then — if the extractor declares one — enrich each item
/// with its detail page (bounded by the independent `detail_semaphore`).
/// Per-site failures never propagate: they are logged and the site is
/// skipped, consistent with the rest of the ingestion pipeline.
#[instrument(level = "debug", skip(fetcher, source, extractor, listing_semaphore, detail_semaphore), fields(source = %source.name))]
pub async fn crawl_source(
    fetcher: &dyn PageFetcher,
    source: &NewsSourceConfig,
    extractor: &SiteExtractor,
    listing_semaphore: Arc<Semaphore>,
    detail_semaphore: Arc<Semaphore>,
) -> Vec<NewsItem> {
    let listing_html = {
        let _permit = listing_semaphore.acquire_owned().await.expect("semaphore never closed");
        match fetcher.fetch_rendered_html(&source.blog_url, extractor.pre_fetch_script).await {
            Ok(html) => html,
            Err(e) => {
                warn!(source = %source.name, error = %e, "crawler listing fetch failed");
                return Vec::new();
            }
        }
    };

    let rows = extract_rows(&listing_html, &extractor.listing, &source.blog_url);
    let mut items: Vec<NewsItem> =
        rows.iter().filter_map(|row| row_to_news_item(row, source, extractor)).collect();

    if let Some(detail_schema) = &extractor.detail {
        for item in items.iter_mut() {
            let _permit = detail_semaphore.clone().acquire_owned().await.expect("semaphore never closed");
            match fetcher.fetch_rendered_html(&item.url, None).await {
                Ok(detail_html) => {
                    item.content = extract_detail_text(&detail_html, detail_schema);
                }
                Err(e) => {
                    warn!(source = %source.name, url = %item.url, error = %e, "detail page fetch failed, keeping listing data only");
                }
            }
        }
    }

    items
}

fn extract_detail_text(html: &str, schema: &DetailPageSchema) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(schema.content_selector).ok()?;
    let text = document.select(&selector).next()?.text().collect::<Vec<_>>().join(" ");
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Production [`PageFetcher`]: one shared Chromium browser context, a fresh
/// page per navigation. Bounded by `crawler_timeout`; a hung navigation
/// surfaces as [`CoreError::Other`] rather than hanging the whole batch.
pub struct PlaywrightPageFetcher {
    browser: playwright::api::Browser,
    timeout: Duration,
}

impl PlaywrightPageFetcher {
    pub async fn new(config: &NewsConfig) -> CoreResult<Self> {
        let playwright = playwright::Playwright::initialize()
            .await
            .map_err(|e| CoreError::Other(format!("playwright init failed: {e}")))?;
        playwright
            .install_chromium()
            .map_err(|e| CoreError::Other(format!("chromium install failed: {e}")))?;
        let browser = playwright
            .chromium()
            .launcher()
            .headless(config.headless)
            .launch()
            .await
            .map_err(|e| CoreError::Other(format!("chromium launch failed: {e}")))?;
        Ok(Self { browser, timeout: Duration::from_secs_f64(config.crawler_timeout) })
    }
}

#[async_trait]
impl PageFetcher for PlaywrightPageFetcher {
    async fn fetch_rendered_html(&self, url: &str, pre_fetch_script: Option<&str>) -> CoreResult<String> {
        let navigate = async {
            let context = self
                .browser
                .context_builder()
                .build()
                .await
                .map_err(|e| CoreError::Other(format!("browser context failed: {e}")))?;
            let page = context
                .new_page()
                .await
                .map_err(|e| CoreError::Other(format!("new page failed: {e}")))?;
            page.goto_builder(url)
                .goto()
                .await
                .map_err(|e| CoreError::Other(format!("navigation to {url} failed: {e}")))?;
            if let Some(script) = pre_fetch_script {
                let _: serde_json::Value = page
                    .eval(script)
                    .await
                    .map_err(|e| CoreError::Other(format!("pre-fetch script failed: {e}")))?;
            }
            page.eval::<String>("() => document.documentElement.outerHTML")
                .await
                .map_err(|e| CoreError::Other(format!("html extraction failed: {e}")))
        };

        tokio::time::timeout(self.timeout, navigate)
            .await
            .map_err(|_| CoreError::Other(format!("crawler navigation to {url} timed out")))?
    }
}
