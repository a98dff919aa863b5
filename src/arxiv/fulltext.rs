//! arXiv official HTML fulltext fetch + structured parse, grounded on
//! `original_source/src/data_fetchers/arxiv/html_fulltext.py`.
//!
//! Strictly limited to `arxiv.org`. Any fetch/parse failure surfaces as
//! `CoreError::HtmlFulltextUnavailable`, per spec §7 — the deep-analysis
//! workflow treats that as a hard failure rather than degrading silently.

use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::instrument;

use crate::error::{CoreError, CoreResult};
use crate::models::{ArxivHtmlFulltext, ArxivHtmlSection, ArxivHtmlSource, ArxivHtmlStats};

const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
const FRONT_MATTER_CAP: usize = 30;

struct EntryMeta {
    entry_id: String,
    title: String,
    abstract_text: String,
}

async fn fetch_atom_entry(client: &reqwest::Client, paper_id: &str) -> CoreResult<EntryMeta> {
    let url = format!("{ARXIV_API_URL}?id_list={paper_id}");
    let resp = client.get(&url).send().await.map_err(CoreError::Http)?;
    if !resp.status().is_success() {
        return Err(CoreError::HtmlFulltextUnavailable(format!(
            "arxiv API request failed: HTTP {}",
            resp.status()
        )));
    }
    let xml = resp.text().await.map_err(CoreError::Http)?;
    parse_single_entry(&xml)
}

fn parse_single_entry(xml: &str) -> CoreResult<EntryMeta> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entry_id = String::new();
    let mut title = String::new();
    let mut abstract_text = String::new();
    let mut in_entry = false;
    let mut text_buffer = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "entry" {
                    in_entry = true;
                }
            }
            Ok(Event::Text(e)) => {
                text_buffer = e.unescape().unwrap_or_default().to_string();
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if in_entry {
                    match name.as_str() {
                        "id" if entry_id.is_empty() => entry_id = text_buffer.clone(),
                        "title" => title = text_buffer.clone(),
                        "summary" => abstract_text = text_buffer.clone(),
                        "entry" => in_entry = false,
                        _ => {}
                    }
                }
                text_buffer.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CoreError::ParseXml(e.to_string())),
            _ => {}
        }
    }

    if entry_id.is_empty() {
        return Err(CoreError::HtmlFulltextUnavailable(
            "arxiv API returned no entry".into(),
        ));
    }
    Ok(EntryMeta {
        entry_id,
        title: title.replace('\n', " ").trim().to_string(),
        abstract_text: abstract_text.trim().to_string(),
    })
}

fn extract_version(entry_id: &str) -> CoreResult<String> {
    let re = Regex::new(r"v(\d+)$").unwrap();
    re.captures(entry_id.trim())
        .map(|c| format!("v{}", &c[1]))
        .ok_or_else(|| CoreError::HtmlFulltextUnavailable(format!("no version suffix in entry id: {entry_id}")))
}

/// Fetch and parse the official HTML fulltext render for `paper_id`
/// (canonical id, no version suffix).
#[instrument(level = "info", skip(client))]
pub async fn fetch_html_fulltext(client: &reqwest::Client, paper_id: &str) -> CoreResult<ArxivHtmlFulltext> {
    let paper_id = paper_id.trim();
    if paper_id.is_empty() {
        return Err(CoreError::HtmlFulltextUnavailable("paper_id is empty".into()));
    }

    let meta = fetch_atom_entry(client, paper_id).await?;
    let version = extract_version(&meta.entry_id)?;
    let html_url = format!("https://arxiv.org/html/{paper_id}{version}");

    let resp = client
        .get(&html_url)
        .header("User-Agent", "ai-insight-tracker/0.1 (fulltext fetcher; +https://arxiv.org)")
        .send()
        .await
        .map_err(CoreError::Http)?;
    if !resp.status().is_success() {
        return Err(CoreError::HtmlFulltextUnavailable(format!(
            "arxiv HTML unavailable: HTTP {}",
            resp.status()
        )));
    }
    let html = resp.text().await.map_err(CoreError::Http)?;
    if html.len() < 1000 {
        return Err(CoreError::HtmlFulltextUnavailable("arxiv HTML content too short".into()));
    }

    let paper_id_owned = paper_id.to_string();
    tokio::task::spawn_blocking(move || parse_fulltext_html(&paper_id_owned, &html_url, &html))
        .await
        .map_err(|e| CoreError::Other(format!("fulltext parse task panicked: {e}")))?
}

fn parse_fulltext_html(paper_id: &str, html_url: &str, html: &str) -> CoreResult<ArxivHtmlFulltext> {
    let document = Html::parse_document(html);
    let root = pick_content_root(&document);

    let section_selector = Selector::parse("h2, h3, h4, h5, h6, p").unwrap();
    let items: Vec<ElementRef> = root.select(&section_selector).collect();

    let front_matter = collect_front_matter(&items);
    let sections = build_sections(&items);

    if sections.is_empty() {
        return Err(CoreError::HtmlFulltextUnavailable(
            "no heading-delimited sections found".into(),
        ));
    }

    let blocks = count_blocks(&sections);
    Ok(ArxivHtmlFulltext {
        paper_id: paper_id.to_string(),
        source: ArxivHtmlSource {
            provider: "arxiv".to_string(),
            url: html_url.to_string(),
            fetched_at: Utc::now(),
        },
        front_matter,
        sections,
        stats: ArxivHtmlStats {
            html_chars: html.len(),
            blocks,
        },
    })
}

fn pick_content_root(document: &Html) -> ElementRef<'_> {
    for sel in ["main", "article", "div#content"] {
        if let Ok(selector) = Selector::parse(sel) {
            if let Some(el) = document.select(&selector).next() {
                return el;
            }
        }
    }
    let body_selector = Selector::parse("body").unwrap();
    if let Some(el) = document.select(&body_selector).next() {
        return el;
    }
    let html_selector = Selector::parse("html").unwrap();
    document
        .select(&html_selector)
        .next()
        .expect("parsed document always has an html root")
}

fn normalize_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: &ElementRef) -> String {
    normalize_text(&el.text().collect::<Vec<_>>().join(" "))
}

fn heading_level(el: &ElementRef) -> Option<u8> {
    let name = el.value().name();
    if name.len() == 2 && name.starts_with('h') {
        name.as_bytes()[1].checked_sub(b'0').filter(|l| (2..=6).contains(l))
    } else {
        None
    }
}

fn collect_front_matter(items: &[ElementRef]) -> Vec<String> {
    let mut paragraphs = Vec::new();
    for el in items {
        if heading_level(el).is_some() {
            break;
        }
        if el.value().name() == "p" {
            let text = element_text(el);
            if !text.is_empty() {
                paragraphs.push(text);
            }
        }
        if paragraphs.len() >= FRONT_MATTER_CAP {
            break;
        }
    }
    paragraphs
}

fn extract_number_and_title(heading_text: &str) -> (Option<String>, String) {
    let text = normalize_text(heading_text);
    let re = Regex::new(r"^(\d+(?:\.\d+)*)\.?\s+(.*)$").unwrap();
    match re.captures(&text) {
        Some(caps) => {
            let number = caps[1].to_string();
            let title = caps[2].trim().to_string();
            (Some(number), if title.is_empty() { text.clone() } else { title })
        }
        None => (None, text),
    }
}

fn build_sections(items: &[ElementRef]) -> Vec<ArxivHtmlSection> {
    let heading_indices: Vec<usize> = items
        .iter()
        .enumerate()
        .filter_map(|(i, el)| heading_level(el).map(|_| i))
        .collect();
    if heading_indices.is_empty() {
        return Vec::new();
    }

    // Flatten into (level, section-with-its-own-paragraphs) in document order.
    let mut flat: Vec<(u8, ArxivHtmlSection)> = Vec::new();
    for (pos, &idx) in heading_indices.iter().enumerate() {
        let heading_el = &items[idx];
        let level = heading_level(heading_el).unwrap();
        let heading_text = element_text(heading_el);
        let (number, title) = extract_number_and_title(&heading_text);

        let end = heading_indices[pos + 1..]
            .iter()
            .find(|&&next_idx| heading_level(&items[next_idx]).unwrap() <= level)
            .copied()
            .unwrap_or(items.len());

        let mut paragraphs = Vec::new();
        for el in &items[idx + 1..end] {
            if el.value().name() == "p" {
                let text = element_text(el);
                if !text.is_empty() {
                    paragraphs.push(text);
                }
            }
        }

        flat.push((
            level,
            ArxivHtmlSection {
                level,
                heading: heading_text,
                number,
                title,
                paragraphs,
                children: Vec::new(),
            },
        ));
    }

    // Assemble the heading-stack tree: a heading nests under the nearest
    // preceding heading of strictly lower level.
    let mut iter = flat.into_iter().peekable();
    nest_sections(&mut iter, 0)
}

fn nest_sections(
    flat: &mut std::iter::Peekable<std::vec::IntoIter<(u8, ArxivHtmlSection)>>,
    parent_level: u8,
) -> Vec<ArxivHtmlSection> {
    let mut nodes = Vec::new();
    while let Some(&(level, _)) = flat.peek() {
        if level <= parent_level {
            break;
        }
        let (level, mut section) = flat.next().unwrap();
        section.children = nest_sections(flat, level);
        nodes.push(section);
    }
    nodes
}

fn count_blocks(sections: &[ArxivHtmlSection]) -> usize {
    let mut count = 0;
    let mut stack: Vec<&ArxivHtmlSection> = sections.iter().collect();
    while let Some(section) = stack.pop() {
        count += 1 + section.paragraphs.len();
        stack.extend(section.children.iter());
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_dotted_heading_numbers() {
        let (number, title) = extract_number_and_title("3.2 Network architecture");
        assert_eq!(number.as_deref(), Some("3.2"));
        assert_eq!(title, "Network architecture");
    }

    #[test]
    fn headings_without_numbers_have_none() {
        let (number, title) = extract_number_and_title("References");
        assert_eq!(number, None);
        assert_eq!(title, "References");
    }

    #[test]
    fn version_extraction_requires_trailing_vn() {
        assert_eq!(extract_version("http://arxiv.org/abs/2501.00001v3").unwrap(), "v3");
        assert!(extract_version("http://arxiv.org/abs/2501.00001").is_err());
    }
}
