use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// Which family of ingestion produced a [`NewsItem`]: feed-parsed or
/// headless-browser-extracted (spec §4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchType {
    Feed,
    Crawler,
}

/// A single ingested news link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub source_name: String,
    pub source_category: String,
    pub language: String,
    pub published: DateTime<Utc>,
    pub weight: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub fetch_type: FetchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl NewsItem {
    /// 16-hex-char prefix of MD5(url), stable across runs (spec §3).
    pub fn id_from_url(url: &str) -> String {
        let digest = Md5::digest(url.as_bytes());
        let hex = format!("{digest:x}");
        hex[..16].to_string()
    }

    pub fn truncate_summary(raw: &str, max_chars: usize) -> String {
        if raw.chars().count() <= max_chars {
            raw.to_string()
        } else {
            raw.chars().take(max_chars).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_from_url_is_stable_and_16_hex_chars() {
        let id1 = NewsItem::id_from_url("https://example.com/a");
        let id2 = NewsItem::id_from_url("https://example.com/a");
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 16);
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn id_from_url_differs_by_url() {
        let a = NewsItem::id_from_url("https://example.com/a");
        let b = NewsItem::id_from_url("https://example.com/b");
        assert_ne!(a, b);
    }

    #[test]
    fn truncate_summary_respects_char_boundary() {
        let s = "hello world";
        assert_eq!(NewsItem::truncate_summary(s, 5), "hello");
        assert_eq!(NewsItem::truncate_summary(s, 100), s);
    }
}
