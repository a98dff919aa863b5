use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an HTML fulltext render was obtained from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArxivHtmlSource {
    pub provider: String,
    pub url: String,
    pub fetched_at: DateTime<Utc>,
}

/// One heading-delimited section of the rendered paper, recursively nested
/// by heading level (spec §4.D "heading-stack tree build").
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArxivHtmlSection {
    pub level: u8,
    pub heading: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    pub title: String,
    pub paragraphs: Vec<String>,
    pub children: Vec<ArxivHtmlSection>,
}

impl ArxivHtmlSection {
    pub fn text(&self) -> String {
        self.paragraphs.join("\n\n")
    }

    /// Depth-first search by case-insensitive substring match on title/heading.
    pub fn find<'a>(&'a self, query: &str) -> Option<&'a ArxivHtmlSection> {
        let needle = query.to_lowercase();
        if self.title.to_lowercase().contains(&needle) || self.heading.to_lowercase().contains(&needle) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(query))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ArxivHtmlStats {
    pub html_chars: usize,
    pub blocks: usize,
}

/// Parsed arXiv HTML fulltext render, exposed to the deep-analysis tool
/// layer via the `Reader` facade methods (`section`, `keyword`, `overview`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArxivHtmlFulltext {
    pub paper_id: String,
    pub source: ArxivHtmlSource,
    pub front_matter: Vec<String>,
    pub sections: Vec<ArxivHtmlSection>,
    pub stats: ArxivHtmlStats,
}

impl ArxivHtmlFulltext {
    /// Facade: locate a section by heading/title substring.
    pub fn section(&self, key: &str) -> Option<&ArxivHtmlSection> {
        self.sections.iter().find_map(|s| s.find(key))
    }

    /// Facade: naive keyword search over front matter + all section text,
    /// returning up to `n` excerpts of `excerpt_len` chars centered loosely
    /// on the match.
    pub fn keyword(&self, query: &str, n: usize, excerpt_len: usize) -> Vec<String> {
        let needle = query.to_lowercase();
        let mut hits = Vec::new();
        let mut scan = |text: &str| {
            if hits.len() >= n {
                return;
            }
            let lower = text.to_lowercase();
            if let Some(pos) = lower.find(&needle) {
                let start = pos.saturating_sub(excerpt_len / 2);
                let end = (pos + needle.len() + excerpt_len / 2).min(text.len());
                let start = text
                    .char_indices()
                    .map(|(i, _)| i)
                    .find(|&i| i >= start)
                    .unwrap_or(0);
                let end = text
                    .char_indices()
                    .map(|(i, _)| i)
                    .find(|&i| i >= end)
                    .unwrap_or(text.len());
                hits.push(text[start..end].to_string());
            }
        };
        for p in &self.front_matter {
            scan(p);
        }
        for section in &self.sections {
            scan_section(section, &mut scan);
        }
        hits.truncate(n);
        hits
    }

    /// Facade: front-matter joined, capped to a short overview.
    pub fn overview(&self) -> String {
        self.front_matter.join("\n\n")
    }
}

fn scan_section(section: &ArxivHtmlSection, scan: &mut impl FnMut(&str)) {
    for p in &section.paragraphs {
        scan(p);
    }
    for child in &section.children {
        scan_section(child, scan);
    }
}

/// Result of one on-demand deep-analysis run, persisted alongside the
/// triggering issue's identifying context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepAnalysisResult {
    pub paper_id: String,
    pub paper_title: String,
    pub report: String,
    pub research_iterations: u32,
    pub write_iterations: u32,
    pub analyzed_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub llm_provider: String,
    pub llm_model: String,
    pub fulltext_parse_status: String,
    pub paper_total_sections: usize,
    pub paper_html_url: String,
    #[serde(default)]
    pub raw_research: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(title: &str, text: &str) -> ArxivHtmlSection {
        ArxivHtmlSection {
            level: 2,
            heading: title.to_string(),
            number: None,
            title: title.to_string(),
            paragraphs: vec![text.to_string()],
            children: vec![],
        }
    }

    #[test]
    fn section_finds_nested_child() {
        let mut root = leaf("Introduction", "intro text");
        root.children.push(leaf("Related Work", "related text"));
        let fulltext = ArxivHtmlFulltext {
            paper_id: "2501.00001".into(),
            source: ArxivHtmlSource {
                provider: "arxiv-html".into(),
                url: "https://arxiv.org/html/2501.00001".into(),
                fetched_at: Utc::now(),
            },
            front_matter: vec!["abstract text".into()],
            sections: vec![root],
            stats: ArxivHtmlStats { html_chars: 100, blocks: 2 },
        };
        assert!(fulltext.section("Related Work").is_some());
        assert!(fulltext.section("Nonexistent").is_none());
    }

    #[test]
    fn keyword_returns_bounded_excerpts() {
        let fulltext = ArxivHtmlFulltext {
            paper_id: "2501.00001".into(),
            source: ArxivHtmlSource {
                provider: "arxiv-html".into(),
                url: "https://arxiv.org/html/2501.00001".into(),
                fetched_at: Utc::now(),
            },
            front_matter: vec!["this paper studies transformer attention".into()],
            sections: vec![leaf("Method", "we use transformer attention layers")],
            stats: ArxivHtmlStats::default(),
        };
        let hits = fulltext.keyword("transformer", 5, 40);
        assert_eq!(hits.len(), 2);
    }
}
