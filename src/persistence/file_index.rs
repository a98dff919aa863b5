//! `file-list.json` writer: reverse-lexicographic filename index over a
//! directory of `YYYY-MM-DD.json` files, per spec §4.I / testable property 7.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::instrument;

use crate::error::CoreResult;
use crate::persistence::write_json_atomic;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIndex {
    pub papers: Vec<String>,
    pub news: Vec<String>,
    pub reports: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl Default for FileIndex {
    fn default() -> Self {
        Self {
            papers: Vec::new(),
            news: Vec::new(),
            reports: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

/// Scan `dir` for `YYYY-MM-DD.json` filenames and return them sorted
/// lexicographic descending (newest date first, since the format sorts
/// lexicographically the same as chronologically).
#[instrument(level = "debug")]
pub async fn list_dated_files(dir: &Path) -> CoreResult<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            if is_dated_json_name(name) {
                names.push(name.to_string());
            }
        }
    }
    names.sort_by(|a, b| b.cmp(a));
    Ok(names)
}

fn is_dated_json_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".json") else {
        return false;
    };
    let bytes = stem.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[8..10].iter().all(u8::is_ascii_digit)
}

/// Rebuild `file-list.json` in `base_dir` from the current contents of its
/// `papers/`, `news/`, and `reports/` subdirectories.
pub async fn rebuild_file_index(base_dir: &Path) -> CoreResult<FileIndex> {
    let index = FileIndex {
        papers: list_dated_files(&base_dir.join("papers")).await?,
        news: list_dated_files(&base_dir.join("news")).await?,
        reports: list_dated_files(&base_dir.join("reports")).await?,
        last_updated: Utc::now(),
    };
    write_json_atomic(&base_dir.join("file-list.json"), &index).await?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_dated_json_names() {
        assert!(is_dated_json_name("2025-01-20.json"));
        assert!(!is_dated_json_name("file-list.json"));
        assert!(!is_dated_json_name("2025-1-20.json"));
        assert!(!is_dated_json_name("not-a-date.json"));
    }

    #[tokio::test]
    async fn list_dated_files_sorts_descending() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("ai_insight_tracker-test-fileindex-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        for name in ["2025-01-18.json", "2025-01-20.json", "2025-01-19.json"] {
            tokio::fs::write(dir.join(name), b"[]").await.unwrap();
        }
        let names = list_dated_files(&dir).await.unwrap();
        assert_eq!(
            names,
            vec!["2025-01-20.json", "2025-01-19.json", "2025-01-18.json"]
        );
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn list_dated_files_missing_dir_is_empty() {
        let mut dir = std::env::temp_dir();
        dir.push("ai_insight_tracker-test-fileindex-missing-dir-does-not-exist");
        let names = list_dated_files(&dir).await.unwrap();
        assert!(names.is_empty());
    }
}
