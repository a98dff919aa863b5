//! arXiv Atom API query-string builders, grounded on
//! `original_source/src/data_fetchers/arxiv/query.py`.

const ARXIV_API_ENDPOINT: &str = "http://export.arxiv.org/api/query";

pub fn build_single_category_query(category: &str, max_results: u32, start: u32) -> String {
    format!(
        "{ARXIV_API_ENDPOINT}?search_query={}&start={start}&max_results={max_results}&sortBy=submittedDate&sortOrder=descending",
        urlencoding::encode(&format!("cat:{category}")),
    )
}

pub fn build_id_query(paper_ids: &[String]) -> String {
    let id_list = paper_ids.join(",");
    format!("{ARXIV_API_ENDPOINT}?id_list={}", urlencoding::encode(&id_list))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_category_query_includes_cat_term() {
        let url = build_single_category_query("cs.AI", 100, 0);
        assert!(url.contains("search_query=cat%3Acs.AI"));
        assert!(url.contains("start=0"));
        assert!(url.contains("max_results=100"));
    }

    #[test]
    fn id_query_joins_with_commas() {
        let url = build_id_query(&["2501.00001".to_string(), "2501.00002".to_string()]);
        assert!(url.contains("id_list=2501.00001%2C2501.00002"));
    }
}
