//! `paper_reader` researcher tool, per spec §4.F: "only present when
//! `paper_sections_available`. Returns overview when no args are given."
//!
//! A thin wrapper over [`ArxivHtmlFulltext`]'s facade methods; the tool
//! itself has no state of its own — the fulltext it reads is borrowed from
//! the run-scoped [`crate::deep::current_paper`] binding.

use crate::models::ArxivHtmlFulltext;

#[derive(Debug, Clone, Default)]
pub struct PaperReaderInput {
    pub section: Option<String>,
    pub keyword: Option<String>,
    pub include_tables: bool,
    pub include_figures: bool,
}

const KEYWORD_MATCHES: usize = 5;
const KEYWORD_EXCERPT_CHARS: usize = 400;

/// Read one view of the paper per `input`: a named section, a keyword
/// search, or (with no args) the paper's overview.
pub fn read_paper(fulltext: &ArxivHtmlFulltext, input: &PaperReaderInput) -> String {
    if let Some(section_key) = input.section.as_deref().filter(|s| !s.trim().is_empty()) {
        return match fulltext.section(section_key) {
            Some(section) => render_section(section, input),
            None => format!("no section matching '{section_key}' found"),
        };
    }

    if let Some(keyword) = input.keyword.as_deref().filter(|s| !s.trim().is_empty()) {
        let hits = fulltext.keyword(keyword, KEYWORD_MATCHES, KEYWORD_EXCERPT_CHARS);
        return if hits.is_empty() {
            format!("no matches for keyword '{keyword}'")
        } else {
            format!("matches for '{keyword}':\n\n{}", hits.join("\n---\n"))
        };
    }

    fulltext.overview()
}

fn render_section(section: &crate::models::ArxivHtmlSection, input: &PaperReaderInput) -> String {
    let mut out = format!("## {}\n\n{}", section.heading, section.text());
    if !input.include_tables && !input.include_figures {
        return out;
    }
    // Table/figure captions are folded into paragraph text by the HTML
    // fulltext parser rather than tracked separately, so these flags only
    // affect whether child sections (which may be figure/table callouts
    // rendered as their own headings) are included in the response.
    for child in &section.children {
        out.push_str(&format!("\n\n### {}\n\n{}", child.heading, child.text()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArxivHtmlSection, ArxivHtmlSource, ArxivHtmlStats};
    use chrono::Utc;

    fn sample_fulltext() -> ArxivHtmlFulltext {
        ArxivHtmlFulltext {
            paper_id: "2501.00001".into(),
            source: ArxivHtmlSource {
                provider: "arxiv-html".into(),
                url: "https://arxiv.org/html/2501.00001".into(),
                fetched_at: Utc::now(),
            },
            front_matter: vec!["This paper introduces a new method.".into()],
            sections: vec![ArxivHtmlSection {
                level: 2,
                heading: "Method".into(),
                number: None,
                title: "Method".into(),
                paragraphs: vec!["We use transformer attention.".into()],
                children: vec![],
            }],
            stats: ArxivHtmlStats { html_chars: 10, blocks: 1 },
        }
    }

    #[test]
    fn no_args_returns_overview() {
        let input = PaperReaderInput::default();
        let out = read_paper(&sample_fulltext(), &input);
        assert_eq!(out, "This paper introduces a new method.");
    }

    #[test]
    fn section_arg_returns_matching_section() {
        let input = PaperReaderInput { section: Some("method".into()), ..Default::default() };
        let out = read_paper(&sample_fulltext(), &input);
        assert!(out.contains("transformer attention"));
    }

    #[test]
    fn keyword_arg_returns_excerpt() {
        let input = PaperReaderInput { keyword: Some("transformer".into()), ..Default::default() };
        let out = read_paper(&sample_fulltext(), &input);
        assert!(out.contains("transformer attention"));
    }

    #[test]
    fn unknown_section_reports_no_match() {
        let input = PaperReaderInput { section: Some("nonexistent".into()), ..Default::default() };
        let out = read_paper(&sample_fulltext(), &input);
        assert!(out.contains("no section matching"));
    }
}
