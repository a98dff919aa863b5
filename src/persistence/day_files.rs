//! Per-date merge-on-write for `papers/{date}.json` and `news/{date}.json`,
//! per spec §4.H's "Merge policy for day files" and §4.I's legacy-read /
//! atomic-write rules.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::models::{AnalysisStatus, AnalyzedItem, NewsItem, Paper};
use crate::persistence::write_json_atomic;

/// What a merge needs from the base type to find and order records: an id
/// to merge by, and an optional publish time to sort by (missing sorts last).
pub trait DayRecord {
    fn record_id(&self) -> &str;
    fn published_at(&self) -> Option<DateTime<Utc>>;
}

impl DayRecord for Paper {
    fn record_id(&self) -> &str {
        &self.id
    }
    fn published_at(&self) -> Option<DateTime<Utc>> {
        Some(self.published)
    }
}

impl DayRecord for NewsItem {
    fn record_id(&self) -> &str {
        &self.id
    }
    fn published_at(&self) -> Option<DateTime<Utc>> {
        Some(self.published)
    }
}

/// Parse a day file's contents, accepting either a JSON array or a legacy
/// line-delimited JSON form (one object per line). Returns `None` if neither
/// form parses, in which case the caller treats the file as empty.
fn parse_day_file_contents<T, A>(raw: &str) -> Option<Vec<AnalyzedItem<T, A>>>
where
    T: DeserializeOwned,
    A: DeserializeOwned,
{
    if let Ok(items) = serde_json::from_str::<Vec<AnalyzedItem<T, A>>>(raw) {
        return Some(items);
    }

    let line_items: Vec<AnalyzedItem<T, A>> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    if line_items.is_empty() && !raw.trim().is_empty() {
        None
    } else {
        Some(line_items)
    }
}

async fn read_day_file<T, A>(path: &Path) -> CoreResult<Vec<AnalyzedItem<T, A>>>
where
    T: DeserializeOwned,
    A: DeserializeOwned,
{
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CoreError::Io(e)),
    };
    match parse_day_file_contents(&raw) {
        Some(items) => Ok(items),
        None => {
            warn!(path = %path.display(), "failed to decode day file, treating as empty");
            Ok(Vec::new())
        }
    }
}

/// Normalize any legacy extension (e.g. `.jsonl`) to `.json`, per §4.I:
/// "If the target path has a legacy extension, the writer normalizes to the
/// array extension."
fn normalize_to_json_extension(path: &Path) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        path.to_path_buf()
    } else {
        path.with_extension("json")
    }
}

fn sort_by_published_desc_missing_last<T: DayRecord, A>(items: &mut [AnalyzedItem<T, A>]) {
    items.sort_by(|a, b| match (a.base.published_at(), b.base.published_at()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Merge `incoming` base records into the day file at `path`, per spec
/// §4.H: a pre-existing `success`-status record for an id is kept fully
/// (its analysis fields untouched); otherwise the incoming base fields
/// overlay the existing record (or a fresh `pending` record is inserted).
/// Result is re-sorted by published-desc (missing last) and written back
/// atomically.
pub async fn merge_day_file<T, A>(path: &Path, incoming: Vec<T>) -> CoreResult<Vec<AnalyzedItem<T, A>>>
where
    T: DayRecord + Clone + Serialize + DeserializeOwned,
    A: Clone + Serialize + DeserializeOwned,
{
    let path = normalize_to_json_extension(path);
    let existing = read_day_file::<T, A>(&path).await?;
    let mut by_id: HashMap<String, AnalyzedItem<T, A>> =
        existing.into_iter().map(|item| (item.base.record_id().to_string(), item)).collect();

    for base in incoming {
        let id = base.record_id().to_string();
        match by_id.get(&id) {
            Some(existing) if existing.analysis_status == AnalysisStatus::Success => {
                // Keep the existing success record fully, dropping the new fetch data.
            }
            Some(_) => {
                let mut merged = by_id.remove(&id).expect("just matched");
                merged.base = base;
                by_id.insert(id, merged);
            }
            None => {
                by_id.insert(id, AnalyzedItem::pending(base));
            }
        }
    }

    let mut merged: Vec<AnalyzedItem<T, A>> = by_id.into_values().collect();
    sort_by_published_desc_missing_last(&mut merged);

    write_json_atomic(&path, &merged).await?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaperAnalysis;

    fn paper(id: &str, title: &str, hours_ago: i64) -> Paper {
        Paper {
            id: id.to_string(),
            title: title.to_string(),
            abstract_text: "abstract".into(),
            authors: vec!["A. Author".into()],
            categories: vec!["cs.AI".into()],
            primary_category: "cs.AI".into(),
            abs_url: format!("https://arxiv.org/abs/{id}"),
            pdf_url: format!("https://arxiv.org/pdf/{id}"),
            published: Utc::now() - chrono::Duration::hours(hours_ago),
            updated: Some(Utc::now() - chrono::Duration::hours(hours_ago)),
            comment: None,
        }
    }

    fn temp_path(label: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("ai_insight_tracker-test-dayfiles-{label}-{}.json", std::process::id()));
        p
    }

    #[tokio::test]
    async fn first_merge_inserts_pending_records() {
        let path = temp_path("first");
        let merged: Vec<AnalyzedItem<Paper, PaperAnalysis>> =
            merge_day_file(&path, vec![paper("p1", "First", 1)]).await.unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].analysis_status, AnalysisStatus::Pending);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn success_record_is_preserved_across_merge() {
        let path = temp_path("preserve");
        let mut item: AnalyzedItem<Paper, PaperAnalysis> = AnalyzedItem::pending(paper("p1", "First", 1));
        item.mark_success(
            PaperAnalysis {
                overview: "o".into(),
                motivation: "m".into(),
                method: "me".into(),
                result: "r".into(),
                conclusion: "c".into(),
                tags: vec!["tag".into()],
            },
            Utc::now(),
        );
        write_json_atomic(&path, &vec![item]).await.unwrap();

        let merged: Vec<AnalyzedItem<Paper, PaperAnalysis>> =
            merge_day_file(&path, vec![paper("p1", "Updated Title", 1)]).await.unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].analysis_status, AnalysisStatus::Success);
        assert_eq!(merged[0].base.title, "First");
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn pending_record_base_fields_are_overlaid_by_incoming() {
        let path = temp_path("overlay");
        let item: AnalyzedItem<Paper, PaperAnalysis> = AnalyzedItem::pending(paper("p1", "First", 1));
        write_json_atomic(&path, &vec![item]).await.unwrap();

        let merged: Vec<AnalyzedItem<Paper, PaperAnalysis>> =
            merge_day_file(&path, vec![paper("p1", "Updated Title", 1)]).await.unwrap();
        assert_eq!(merged[0].base.title, "Updated Title");
        assert_eq!(merged[0].analysis_status, AnalysisStatus::Pending);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn merged_records_sort_by_published_desc() {
        let path = temp_path("sort");
        let merged: Vec<AnalyzedItem<Paper, PaperAnalysis>> =
            merge_day_file(&path, vec![paper("old", "Old", 10), paper("new", "New", 1)]).await.unwrap();
        assert_eq!(merged[0].base.id, "new");
        assert_eq!(merged[1].base.id, "old");
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[test]
    fn legacy_line_delimited_json_parses() {
        let raw = r#"{"id":"p1","title":"A","abstract":"x","authors":[],"categories":[],"primary_category":"cs.AI","abs_url":"u","pdf_url":"u","published":"2025-01-01T00:00:00Z","updated":"2025-01-01T00:00:00Z","analysis_status":"pending"}
{"id":"p2","title":"B","abstract":"y","authors":[],"categories":[],"primary_category":"cs.AI","abs_url":"u","pdf_url":"u","published":"2025-01-02T00:00:00Z","updated":"2025-01-02T00:00:00Z","analysis_status":"pending"}"#;
        let items: Option<Vec<AnalyzedItem<Paper, PaperAnalysis>>> = parse_day_file_contents(raw);
        let items = items.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].base.id, "p1");
    }
}
