//! Five named crawler-family extractors, one per site, per spec §4.C:
//! "named extractors (one per site) declare a CSS extraction schema". Each
//! is a `const`/`fn` pair rather than a type per site — the schema is data,
//! not behavior, matching the data-driven `{baseSelector, fields}` shape the
//! spec names.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::news::crawler::{CssExtractionSchema, DetailPageSchema, FieldKind, FieldSchema, SiteExtractor};

fn parse_iso_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = raw.parse::<DateTime<Utc>>() {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| Utc.from_local_datetime(&naive).single())
}

fn parse_month_day_year(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(raw.trim(), "%B %d, %Y")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .and_then(|naive| Utc.from_local_datetime(&naive).single())
        .or_else(|| parse_iso_date(raw))
}

pub fn claude_extractor() -> SiteExtractor {
    SiteExtractor {
        name: "claude",
        listing: CssExtractionSchema {
            base_selector: "article",
            fields: &[
                FieldSchema { name: "title", selector: "h3, h2", kind: FieldKind::Text, attribute: None },
                FieldSchema { name: "url", selector: "a", kind: FieldKind::Attribute, attribute: Some("href") },
                FieldSchema { name: "date", selector: "time", kind: FieldKind::Text, attribute: None },
                FieldSchema { name: "summary", selector: "p", kind: FieldKind::Text, attribute: None },
            ],
        },
        pre_fetch_script: None,
        detail: Some(DetailPageSchema { content_selector: "article, main" }),
        parse_date: parse_iso_date,
    }
}

pub fn cursor_extractor() -> SiteExtractor {
    SiteExtractor {
        name: "cursor",
        listing: CssExtractionSchema {
            base_selector: "article, .blog-post-card",
            fields: &[
                FieldSchema { name: "title", selector: "h2, h3", kind: FieldKind::Text, attribute: None },
                FieldSchema { name: "url", selector: "a", kind: FieldKind::Attribute, attribute: Some("href") },
                FieldSchema { name: "date", selector: "time", kind: FieldKind::Text, attribute: None },
                FieldSchema { name: "summary", selector: "p", kind: FieldKind::Text, attribute: None },
            ],
        },
        pre_fetch_script: Some("() => window.scrollTo(0, document.body.scrollHeight)"),
        detail: Some(DetailPageSchema { content_selector: "article" }),
        parse_date: parse_iso_date,
    }
}

pub fn deepseek_extractor() -> SiteExtractor {
    SiteExtractor {
        name: "deepseek",
        listing: CssExtractionSchema {
            base_selector: "li, article",
            fields: &[
                FieldSchema { name: "title", selector: "a", kind: FieldKind::Text, attribute: None },
                FieldSchema { name: "url", selector: "a", kind: FieldKind::Attribute, attribute: Some("href") },
                FieldSchema { name: "date", selector: "time, span.date", kind: FieldKind::Text, attribute: None },
            ],
        },
        pre_fetch_script: None,
        detail: Some(DetailPageSchema { content_selector: "main, article" }),
        parse_date: parse_iso_date,
    }
}

pub fn google_research_extractor() -> SiteExtractor {
    SiteExtractor {
        name: "google_research",
        listing: CssExtractionSchema {
            base_selector: "div.glue-card, article",
            fields: &[
                FieldSchema { name: "title", selector: "h3, h2", kind: FieldKind::Text, attribute: None },
                FieldSchema { name: "url", selector: "a", kind: FieldKind::Attribute, attribute: Some("href") },
                FieldSchema { name: "date", selector: "time", kind: FieldKind::Text, attribute: None },
                FieldSchema { name: "summary", selector: "p", kind: FieldKind::Text, attribute: None },
            ],
        },
        pre_fetch_script: Some("() => document.querySelectorAll('button[aria-label=\"Close\"]').forEach(b => b.click())"),
        detail: Some(DetailPageSchema { content_selector: "article, main" }),
        parse_date: parse_month_day_year,
    }
}

pub fn qwen_extractor() -> SiteExtractor {
    SiteExtractor {
        name: "qwen",
        listing: CssExtractionSchema {
            base_selector: "article, .post-item",
            fields: &[
                FieldSchema { name: "title", selector: "h2, h3", kind: FieldKind::Text, attribute: None },
                FieldSchema { name: "url", selector: "a", kind: FieldKind::Attribute, attribute: Some("href") },
                FieldSchema { name: "date", selector: "time, .post-date", kind: FieldKind::Text, attribute: None },
                FieldSchema { name: "summary", selector: "p", kind: FieldKind::Text, attribute: None },
            ],
        },
        pre_fetch_script: None,
        detail: Some(DetailPageSchema { content_selector: "article, main" }),
        parse_date: parse_iso_date,
    }
}

/// Resolve a source's `extractor` name to its declared schema.
pub fn extractor_for(name: &str) -> Option<SiteExtractor> {
    match name {
        "claude" => Some(claude_extractor()),
        "cursor" => Some(cursor_extractor()),
        "deepseek" => Some(deepseek_extractor()),
        "google_research" => Some(google_research_extractor()),
        "qwen" => Some(qwen_extractor()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_five_named_extractors_resolve() {
        for name in ["claude", "cursor", "deepseek", "google_research", "qwen"] {
            assert!(extractor_for(name).is_some(), "{name} should resolve");
        }
    }

    #[test]
    fn unknown_extractor_name_resolves_to_none() {
        assert!(extractor_for("unknown-site").is_none());
    }

    #[test]
    fn parses_month_day_year_dates() {
        let dt = parse_month_day_year("January 20, 2025").unwrap();
        assert_eq!(dt.date_naive().to_string(), "2025-01-20");
    }
}
