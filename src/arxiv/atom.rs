//! Atom XML parsing for arXiv API responses, in the manual event-loop style
//! of `dashflow-arxiv`'s `parse_arxiv_response` (`quick_xml::Reader` +
//! `Event::Start/Empty/Text/End/Eof`), adapted to populate [`Paper`] records.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::models::Paper;

#[derive(Default)]
struct RawEntry {
    id_url: String,
    title: String,
    summary: String,
    authors: Vec<String>,
    categories: Vec<String>,
    primary_category: Option<String>,
    published: String,
    updated: String,
    pdf_url: String,
    comment: Option<String>,
}

pub fn parse_atom_feed(xml: &str) -> CoreResult<Vec<Paper>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut papers = Vec::new();
    let mut current: Option<RawEntry> = None;
    let mut in_entry = false;
    let mut in_author = false;
    let mut text_buffer = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "entry" {
                    in_entry = true;
                    current = Some(RawEntry::default());
                } else if name == "author" && in_entry {
                    in_author = true;
                } else if name == "link" && in_entry {
                    let mut is_pdf = false;
                    let mut href = String::new();
                    for attr in e.attributes().flatten() {
                        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                        let value = String::from_utf8_lossy(&attr.value).to_string();
                        if key == "title" && value == "pdf" {
                            is_pdf = true;
                        }
                        if key == "href" {
                            href = value;
                        }
                    }
                    if is_pdf {
                        if let Some(entry) = current.as_mut() {
                            entry.pdf_url = href;
                        }
                    }
                } else if name == "category" && in_entry {
                    for attr in e.attributes().flatten() {
                        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                        if key == "term" {
                            let term = String::from_utf8_lossy(&attr.value).to_string();
                            if let Some(entry) = current.as_mut() {
                                entry.categories.push(term);
                            }
                        }
                    }
                } else if name == "arxiv:primary_category" && in_entry {
                    for attr in e.attributes().flatten() {
                        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                        if key == "term" {
                            let term = String::from_utf8_lossy(&attr.value).to_string();
                            if let Some(entry) = current.as_mut() {
                                entry.primary_category = Some(term);
                            }
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                text_buffer = e.unescape().unwrap_or_default().to_string();
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "entry" {
                    if let Some(entry) = current.take() {
                        match entry_to_paper(entry) {
                            Ok(paper) => papers.push(paper),
                            Err(e) => warn!(error = %e, "skipping unparseable arxiv entry"),
                        }
                    }
                    in_entry = false;
                } else if name == "author" {
                    in_author = false;
                } else if in_entry {
                    if let Some(entry) = current.as_mut() {
                        match name.as_str() {
                            "id" => entry.id_url = text_buffer.clone(),
                            "title" => entry.title = text_buffer.clone(),
                            "summary" => entry.summary = text_buffer.clone(),
                            "published" => entry.published = text_buffer.clone(),
                            "updated" => entry.updated = text_buffer.clone(),
                            "arxiv:comment" => entry.comment = Some(text_buffer.clone()),
                            "name" if in_author => entry.authors.push(text_buffer.clone()),
                            _ => {}
                        }
                    }
                }
                text_buffer.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CoreError::ParseXml(e.to_string())),
            _ => {}
        }
    }

    Ok(papers)
}

fn entry_to_paper(entry: RawEntry) -> CoreResult<Paper> {
    if entry.id_url.is_empty() {
        return Err(CoreError::ParseFeed("entry missing id".into()));
    }
    let raw_id = entry
        .id_url
        .rsplit('/')
        .next()
        .ok_or_else(|| CoreError::ParseFeed("entry id missing path segment".into()))?;
    let id = Paper::strip_version(raw_id);
    let (abs_url, pdf_url) = Paper::urls_for_id(&id);
    let pdf_url = if entry.pdf_url.is_empty() { pdf_url } else { entry.pdf_url };

    let published = parse_datetime(&entry.published);
    let updated = if entry.updated.is_empty() {
        None
    } else {
        Some(parse_datetime(&entry.updated))
    };

    let primary_category = entry
        .primary_category
        .or_else(|| entry.categories.first().cloned())
        .unwrap_or_default();

    Ok(Paper {
        id,
        title: Paper::normalize_whitespace(&entry.title),
        abstract_text: Paper::normalize_whitespace(&entry.summary),
        authors: entry.authors,
        categories: entry.categories,
        primary_category,
        abs_url,
        pdf_url,
        published,
        updated,
        comment: entry.comment,
    })
}

fn parse_datetime(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
    <feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
        <entry>
            <id>http://arxiv.org/abs/2501.12345v2</id>
            <title>  A Paper About
            Things  </title>
            <summary>An abstract
            spanning lines.</summary>
            <published>2025-01-18T00:00:00Z</published>
            <updated>2025-01-19T00:00:00Z</updated>
            <author><name>Jane Doe</name></author>
            <author><name>John Roe</name></author>
            <link title="pdf" href="http://arxiv.org/pdf/2501.12345v2"/>
            <category term="cs.AI"/>
            <category term="cs.LG"/>
            <arxiv:primary_category term="cs.AI"/>
            <arxiv:comment>10 pages</arxiv:comment>
        </entry>
    </feed>"#;

    #[test]
    fn parses_single_entry_with_all_fields() {
        let papers = parse_atom_feed(SAMPLE).unwrap();
        assert_eq!(papers.len(), 1);
        let p = &papers[0];
        assert_eq!(p.id, "2501.12345");
        assert_eq!(p.title, "A Paper About Things");
        assert_eq!(p.abstract_text, "An abstract spanning lines.");
        assert_eq!(p.authors, vec!["Jane Doe".to_string(), "John Roe".to_string()]);
        assert_eq!(p.primary_category, "cs.AI");
        assert_eq!(p.categories, vec!["cs.AI".to_string(), "cs.LG".to_string()]);
        assert_eq!(p.comment.as_deref(), Some("10 pages"));
        assert!(p.updated.is_some());
    }

    #[test]
    fn empty_feed_yields_no_papers() {
        let xml = r#"<?xml version="1.0"?><feed></feed>"#;
        assert!(parse_atom_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn malformed_entry_is_skipped_not_fatal() {
        let xml = r#"<?xml version="1.0"?>
        <feed>
            <entry>
                <id></id>
                <title>No id at all</title>
                <summary>s</summary>
                <published>2025-01-01T00:00:00Z</published>
            </entry>
        </feed>"#;
        let papers = parse_atom_feed(xml).unwrap();
        assert!(papers.is_empty());
    }
}
