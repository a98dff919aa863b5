//! Feed family: Atom/RSS fetch + parse, in the same manual
//! `quick_xml::Reader` event-loop style as [`crate::arxiv::atom`], adapted to
//! the looser RSS/Atom mix real blogs publish (`item` or `entry`,
//! `pubDate`/`published`/`updated`/`created`, `link` as text or `href`
//! attribute, `description`/`summary`/`content`).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::config::NewsConfig;
use crate::models::{FetchType, NewsItem};
use crate::news::sources::NewsSourceConfig;

const USER_AGENT: &str = "ai-insight-tracker/0.1 (+https://github.com/graves/ai_insight_tracker)";
const MAX_SUMMARY_CHARS: usize = 500;

#[derive(Default)]
struct RawEntry {
    link_text: String,
    link_href: String,
    title: String,
    published: String,
    updated: String,
    created: String,
    summary: String,
    description: String,
    content: String,
}

/// Parse an RSS `<item>` or Atom `<entry>` list into raw rows; field
/// resolution into [`NewsItem`] happens in [`entries_to_news_items`] since it
/// needs the owning [`NewsSourceConfig`].
fn parse_feed_entries(xml: &str) -> Vec<RawEntry> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<RawEntry> = None;
    let mut in_item = false;
    let mut text_buffer = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = local_name(e.name().as_ref());
                if name == "item" || name == "entry" {
                    in_item = true;
                    current = Some(RawEntry::default());
                } else if name == "link" && in_item {
                    for attr in e.attributes().flatten() {
                        if local_name(attr.key.as_ref()) == "href" {
                            if let Some(entry) = current.as_mut() {
                                entry.link_href = String::from_utf8_lossy(&attr.value).to_string();
                            }
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                text_buffer = e.unescape().unwrap_or_default().to_string();
            }
            Ok(Event::CData(e)) => {
                text_buffer = String::from_utf8_lossy(&e.into_inner()).to_string();
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.name().as_ref());
                if name == "item" || name == "entry" {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                    in_item = false;
                } else if in_item {
                    if let Some(entry) = current.as_mut() {
                        match name.as_str() {
                            "title" => entry.title = text_buffer.clone(),
                            "link" => entry.link_text = text_buffer.clone(),
                            "pubdate" => entry.published = text_buffer.clone(),
                            "published" => entry.published = text_buffer.clone(),
                            "updated" => entry.updated = text_buffer.clone(),
                            "created" | "pubdate:created" => entry.created = text_buffer.clone(),
                            "summary" => entry.summary = text_buffer.clone(),
                            "description" => entry.description = text_buffer.clone(),
                            "encoded" | "content" => entry.content = text_buffer.clone(),
                            _ => {}
                        }
                    }
                }
                text_buffer.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "feed xml parse error, stopping at current position");
                break;
            }
            _ => {}
        }
    }

    entries
}

fn local_name(raw: &[u8]) -> String {
    let full = String::from_utf8_lossy(raw);
    full.rsplit(':').next().unwrap_or(&full).to_lowercase()
}

fn strip_html_tags(raw: &str) -> String {
    let fragment = scraper::Html::parse_fragment(raw);
    fragment.root_element().text().collect::<Vec<_>>().join(" ")
}

fn entries_to_news_items(entries: Vec<RawEntry>, source: &NewsSourceConfig) -> Vec<NewsItem> {
    entries
        .into_iter()
        .filter_map(|entry| {
            if entry.title.trim().is_empty() {
                return None;
            }
            let url = if !entry.link_href.is_empty() { entry.link_href } else { entry.link_text };
            if url.trim().is_empty() {
                return None;
            }

            let published = [entry.published.as_str(), entry.updated.as_str(), entry.created.as_str()]
                .iter()
                .find_map(|raw| parse_feed_datetime(raw))
                .unwrap_or_else(Utc::now);

            let raw_summary = if !entry.summary.is_empty() { entry.summary } else { entry.description.clone() };
            let summary = if raw_summary.is_empty() {
                None
            } else {
                Some(NewsItem::truncate_summary(&strip_html_tags(&raw_summary), MAX_SUMMARY_CHARS))
            };
            let content = if entry.content.is_empty() { None } else { Some(strip_html_tags(&entry.content)) };

            Some(NewsItem {
                id: NewsItem::id_from_url(&url),
                title: entry.title.trim().to_string(),
                url,
                source_name: source.name.clone(),
                source_category: source.company.clone(),
                language: source.language.clone(),
                published,
                weight: source.weight,
                summary,
                content,
                fetch_type: FetchType::Feed,
                company: Some(source.company.clone()),
            })
        })
        .collect()
}

fn parse_feed_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if raw.trim().is_empty() {
        return None;
    }
    if let Ok(dt) = raw.parse::<DateTime<Utc>>() {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    None
}

/// Fetch and parse a single source's feed, with exponential-backoff retry
/// matching the arXiv client's curve.
#[instrument(level = "debug", skip(http, source), fields(source = %source.name))]
async fn fetch_one_feed(http: &Client, source: &NewsSourceConfig, max_retries: u32) -> Vec<NewsItem> {
    let Some(feed_url) = source.feed_url.as_deref() else {
        warn!(source = %source.name, "feed source has no feed_url, skipping");
        return Vec::new();
    };

    for attempt in 0..max_retries {
        match http.get(feed_url).header("User-Agent", USER_AGENT).send().await {
            Ok(response) if response.status().is_success() => {
                return match response.text().await {
                    Ok(body) => entries_to_news_items(parse_feed_entries(&body), source),
                    Err(e) => {
                        warn!(source = %source.name, error = %e, "feed body read failed");
                        Vec::new()
                    }
                };
            }
            Ok(response) => {
                warn!(source = %source.name, status = %response.status(), attempt, "feed fetch returned non-success status");
            }
            Err(e) => {
                warn!(source = %source.name, error = %e, attempt, "feed fetch request failed");
            }
        }
        if attempt + 1 < max_retries {
            sleep(Duration::from_secs(2u64.pow(attempt))).await;
        }
    }

    warn!(source = %source.name, "feed fetch exhausted retries, skipping source");
    Vec::new()
}

/// Fetch all feed-family sources concurrently, bounded by
/// `feed_max_concurrent` (spec §4.C / §5).
#[instrument(level = "info", skip(sources, config), fields(n = sources.len()))]
pub async fn fetch_feed_sources(sources: &[&NewsSourceConfig], config: &NewsConfig) -> Vec<NewsItem> {
    let http = Client::builder()
        .timeout(Duration::from_secs_f64(config.rss_timeout))
        .build()
        .unwrap_or_default();
    let semaphore = Arc::new(Semaphore::new(config.rss_max_concurrent.max(1)));

    let mut handles = Vec::new();
    for source in sources {
        let http = http.clone();
        let source = (*source).clone();
        let semaphore = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            fetch_one_feed(&http, &source, 3).await
        }));
    }

    let mut items = Vec::new();
    for handle in handles {
        if let Ok(mut fetched) = handle.await {
            items.append(&mut fetched);
        }
    }

    info!(total = items.len(), "feed family ingestion complete");
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source() -> NewsSourceConfig {
        NewsSourceConfig {
            name: "example-blog".into(),
            company: "Example".into(),
            blog_url: "https://example.com".into(),
            fetch_type: FetchType::Feed,
            feed_url: Some("https://example.com/feed".into()),
            extractor: None,
            js_render: false,
            language: "en".into(),
            weight: 1.0,
            enabled: true,
        }
    }

    const RSS_SAMPLE: &str = r#"<?xml version="1.0"?>
    <rss version="2.0"><channel>
        <item>
            <title>First Post</title>
            <link>https://example.com/first</link>
            <pubDate>Mon, 20 Jan 2025 10:00:00 GMT</pubDate>
            <description><![CDATA[<p>A <b>summary</b> block.</p>]]></description>
        </item>
    </channel></rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0"?>
    <feed xmlns="http://www.w3.org/2005/Atom">
        <entry>
            <title>Atom Post</title>
            <link href="https://example.com/atom-post"/>
            <published>2025-01-20T10:00:00Z</published>
            <summary>An atom summary.</summary>
        </entry>
    </feed>"#;

    #[test]
    fn parses_rss_item_with_cdata_description() {
        let entries = parse_feed_entries(RSS_SAMPLE);
        let items = entries_to_news_items(entries, &sample_source());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "First Post");
        assert_eq!(items[0].url, "https://example.com/first");
        assert_eq!(items[0].summary.as_deref(), Some("A summary block."));
    }

    #[test]
    fn parses_atom_entry_with_href_link() {
        let entries = parse_feed_entries(ATOM_SAMPLE);
        let items = entries_to_news_items(entries, &sample_source());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://example.com/atom-post");
        assert_eq!(items[0].summary.as_deref(), Some("An atom summary."));
    }

    #[test]
    fn entries_missing_title_or_link_are_dropped() {
        let xml = r#"<rss><channel><item><description>no title or link</description></item></channel></rss>"#;
        let entries = parse_feed_entries(xml);
        let items = entries_to_news_items(entries, &sample_source());
        assert!(items.is_empty());
    }

    #[test]
    fn id_is_derived_from_resolved_url() {
        let entries = parse_feed_entries(RSS_SAMPLE);
        let items = entries_to_news_items(entries, &sample_source());
        assert_eq!(items[0].id, NewsItem::id_from_url("https://example.com/first"));
    }
}
