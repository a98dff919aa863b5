use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable arXiv paper record, as fetched from the Atom API.
///
/// `id` is always the canonical id without a version suffix
/// (`YYYY.NNNNN`); `abs_url`/`pdf_url` are derived from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paper {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub primary_category: String,
    pub abs_url: String,
    pub pdf_url: String,
    pub published: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Paper {
    /// Derive the canonical abstract/PDF URLs for a bare id.
    pub fn urls_for_id(id: &str) -> (String, String) {
        (
            format!("https://arxiv.org/abs/{id}"),
            format!("https://arxiv.org/pdf/{id}.pdf"),
        )
    }

    /// `max(published, updated)`, used for time-window filtering and
    /// pagination stop conditions (spec §4.B).
    pub fn latest_time(&self) -> DateTime<Utc> {
        match self.updated {
            Some(updated) if updated > self.published => updated,
            _ => self.published,
        }
    }

    /// Collapse internal whitespace/newlines to single spaces, trimmed.
    pub fn normalize_whitespace(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Strip a trailing `vN` version suffix from a raw arXiv id.
    pub fn strip_version(raw_id: &str) -> String {
        match raw_id.rfind('v') {
            Some(pos) if raw_id[pos + 1..].chars().all(|c| c.is_ascii_digit()) && pos + 1 < raw_id.len() => {
                raw_id[..pos].to_string()
            }
            _ => raw_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_version_removes_suffix() {
        assert_eq!(Paper::strip_version("2501.12345v2"), "2501.12345");
        assert_eq!(Paper::strip_version("2501.12345"), "2501.12345");
    }

    #[test]
    fn urls_for_id_are_derived() {
        let (abs, pdf) = Paper::urls_for_id("2501.12345");
        assert_eq!(abs, "https://arxiv.org/abs/2501.12345");
        assert_eq!(pdf, "https://arxiv.org/pdf/2501.12345.pdf");
    }

    #[test]
    fn latest_time_prefers_updated_when_newer() {
        let published: DateTime<Utc> = "2025-01-01T00:00:00Z".parse().unwrap();
        let updated: DateTime<Utc> = "2025-01-05T00:00:00Z".parse().unwrap();
        let paper = Paper {
            id: "x".into(),
            title: "t".into(),
            abstract_text: "a".into(),
            authors: vec![],
            categories: vec![],
            primary_category: "cs.AI".into(),
            abs_url: String::new(),
            pdf_url: String::new(),
            published,
            updated: Some(updated),
            comment: None,
        };
        assert_eq!(paper.latest_time(), updated);
    }

    #[test]
    fn normalize_whitespace_collapses_newlines() {
        assert_eq!(Paper::normalize_whitespace("a\n  b\t c"), "a b c");
    }
}
