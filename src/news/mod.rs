//! News ingestion: feed family + crawler family fan-in, then the post-merge
//! pipeline named in spec §4.C (merge, time-window filter, in-batch dedup,
//! history subtraction, sort).

mod crawler;
mod extractors;
mod feed;
mod sources;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::config::NewsConfig;
use crate::ids::IdTracker;
use crate::models::NewsItem;

pub use crawler::{CssExtractionSchema, DetailPageSchema, FieldKind, FieldSchema, PageFetcher, PlaywrightPageFetcher, SiteExtractor};
pub use extractors::extractor_for;
pub use feed::fetch_feed_sources;
pub use sources::{crawler_sources, feed_sources, load_sources, NewsSourceConfig};

/// Run both ingestion families and the full post-merge pipeline, returning a
/// deduplicated, history-subtracted, sorted batch ready to persist.
///
/// `fetcher` is injected so callers (and tests) can swap in a fake
/// [`PageFetcher`] instead of launching a real browser.
#[instrument(level = "info", skip(sources, config, fetched_ids, fetcher))]
pub async fn ingest_news(
    sources: &[NewsSourceConfig],
    config: &NewsConfig,
    fetched_ids: &IdTracker,
    fetcher: &dyn PageFetcher,
) -> Vec<NewsItem> {
    let feed_refs = feed_sources(sources);
    let crawler_refs = crawler_sources(sources);

    let feed_items = fetch_feed_sources(&feed_refs, config).await;

    let listing_semaphore = Arc::new(Semaphore::new(config.crawler_max_concurrent.max(1)));
    let detail_semaphore = Arc::new(Semaphore::new(config.crawler_max_concurrent.max(1)));

    let mut crawler_items = Vec::new();
    for source in crawler_refs {
        let Some(extractor_name) = source.extractor.as_deref() else {
            warn!(source = %source.name, "crawler source has no extractor configured, skipping");
            continue;
        };
        let Some(extractor) = extractor_for(extractor_name) else {
            warn!(source = %source.name, extractor = extractor_name, "unknown extractor name, skipping source");
            continue;
        };
        let mut items = crawler::crawl_source(
            fetcher,
            source,
            &extractor,
            listing_semaphore.clone(),
            detail_semaphore.clone(),
        )
        .await;
        crawler_items.append(&mut items);
    }

    let mut merged = feed_items;
    merged.append(&mut crawler_items);

    let fetched = post_merge_pipeline(merged, config.hours, fetched_ids).await;
    info!(total = fetched.len(), "news ingestion complete");
    fetched
}

/// Steps 2-5 of spec §4.C's post-merge processing: time-window filter,
/// in-batch dedup by id (first wins), history subtraction against the
/// `fetched` tracker, then sort by `(weight desc, published desc)`.
pub async fn post_merge_pipeline(merged: Vec<NewsItem>, hours: u32, fetched_ids: &IdTracker) -> Vec<NewsItem> {
    let cutoff = Utc::now() - chrono::Duration::hours(hours as i64);
    let recent: Vec<NewsItem> = merged.into_iter().filter(|item| item.published >= cutoff).collect();

    let mut seen = HashSet::new();
    let mut deduped = Vec::new();
    for item in recent {
        if seen.insert(item.id.clone()) {
            deduped.push(item);
        }
    }

    let already_fetched = fetched_ids.news_ids().await.unwrap_or_default();
    let mut fresh: Vec<NewsItem> = deduped.into_iter().filter(|item| !already_fetched.contains(&item.id)).collect();

    fresh.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.published.cmp(&a.published))
    });

    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FetchType;

    fn item(id: &str, weight: f32, published_hours_ago: i64) -> NewsItem {
        NewsItem {
            id: id.to_string(),
            title: format!("item {id}"),
            url: format!("https://example.com/{id}"),
            source_name: "src".into(),
            source_category: "cat".into(),
            language: "en".into(),
            published: Utc::now() - chrono::Duration::hours(published_hours_ago),
            weight,
            summary: None,
            content: None,
            fetch_type: FetchType::Feed,
            company: None,
        }
    }

    fn temp_tracker_path(label: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("ai_insight_tracker-test-news-{label}-{}.json", std::process::id()));
        p
    }

    #[tokio::test]
    async fn drops_items_older_than_window() {
        let path = temp_tracker_path("window");
        let tracker = IdTracker::fetched(&path);
        let items = vec![item("fresh", 1.0, 1), item("stale", 1.0, 200)];
        let result = post_merge_pipeline(items, 168, &tracker).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "fresh");
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn dedups_by_id_first_wins() {
        let path = temp_tracker_path("dedup");
        let tracker = IdTracker::fetched(&path);
        let mut a = item("dup", 1.0, 1);
        a.title = "first".into();
        let mut b = item("dup", 1.0, 1);
        b.title = "second".into();
        let result = post_merge_pipeline(vec![a, b], 168, &tracker).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].title, "first");
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn subtracts_already_fetched_ids() {
        let path = temp_tracker_path("subtract");
        let tracker = IdTracker::fetched(&path);
        tracker.mark_news(&["known".to_string()]).await.unwrap();
        let items = vec![item("known", 1.0, 1), item("new", 1.0, 1)];
        let result = post_merge_pipeline(items, 168, &tracker).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "new");
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn sorts_by_weight_desc_then_published_desc() {
        let path = temp_tracker_path("sort");
        let tracker = IdTracker::fetched(&path);
        let items = vec![item("low-weight", 0.5, 1), item("high-weight", 2.0, 10), item("newest", 2.0, 1)];
        let result = post_merge_pipeline(items, 168, &tracker).await;
        assert_eq!(result[0].id, "newest");
        assert_eq!(result[1].id, "high-weight");
        assert_eq!(result[2].id, "low-weight");
        let _ = tokio::fs::remove_file(&path).await;
    }
}
