//! `arxiv_loader` researcher tool, per spec §4.F: "single Atom query,
//! timeout-bounded." Thin wrapper around [`ArxivClient::fetch_by_ids`],
//! formatting the result the way
//! `original_source/src/agents/paper/deep_analyzer/tools/arxiv_loader.py`
//! formats its single-paper lookup.

use std::time::Duration;

use crate::arxiv::ArxivClient;

/// Look up one arXiv paper by id and render it as the plain-text block the
/// researcher reads back. Never propagates an error: any failure becomes a
/// human-readable message in the returned string, matching the tool
/// contract's all-paths-return-text behavior.
pub async fn load_arxiv_paper(client: &ArxivClient, paper_id: &str, timeout: Duration) -> String {
    let paper_id = paper_id.trim().trim_start_matches("arXiv:").to_string();
    let ids = vec![paper_id.clone()];

    let fetch = client.fetch_by_ids(&ids);
    let result = match tokio::time::timeout(timeout, fetch).await {
        Ok(Ok(papers)) => papers,
        Ok(Err(e)) => return format!("failed to fetch paper {paper_id}: {e}"),
        Err(_) => return format!("fetching paper {paper_id} timed out"),
    };

    let Some(paper) = result.into_iter().next() else {
        return format!("no paper found for id: {paper_id}");
    };
    format_paper(&paper)
}

fn format_paper(paper: &crate::models::Paper) -> String {
    let authors = if paper.authors.is_empty() { "unknown".to_string() } else { paper.authors.join(", ") };
    let categories = if paper.categories.is_empty() { "uncategorized".to_string() } else { paper.categories.join(", ") };

    let mut out = format!(
        "arXiv ID: {}\nTitle: {}\nAuthors: {authors}\nCategories: {categories}\nPublished: {}\nAbstract page: {}\nPDF: {}\n",
        paper.id,
        paper.title,
        paper.published.date_naive(),
        paper.abs_url,
        paper.pdf_url,
    );
    if let Some(comment) = &paper.comment {
        out.push_str(&format!("Comment: {comment}\n"));
    }
    out.push_str(&format!("\nAbstract:\n{}", paper.abstract_text));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Paper;
    use chrono::Utc;

    fn sample_paper() -> Paper {
        Paper {
            id: "2501.12345".into(),
            title: "A Great Paper".into(),
            abstract_text: "We show things.".into(),
            authors: vec!["Jane Doe".into(), "John Roe".into()],
            categories: vec!["cs.AI".into()],
            primary_category: "cs.AI".into(),
            abs_url: "https://arxiv.org/abs/2501.12345".into(),
            pdf_url: "https://arxiv.org/pdf/2501.12345".into(),
            published: Utc::now(),
            updated: Some(Utc::now()),
            comment: Some("Accepted at FOO 2025".into()),
        }
    }

    #[test]
    fn formats_paper_with_comment() {
        let text = format_paper(&sample_paper());
        assert!(text.contains("arXiv ID: 2501.12345"));
        assert!(text.contains("Jane Doe, John Roe"));
        assert!(text.contains("Comment: Accepted at FOO 2025"));
        assert!(text.contains("We show things."));
    }
}
