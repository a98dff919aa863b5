//! Declarative source list, per spec §4.C: "Two source families, both
//! declared in a YAML-style config providing `{name, company, blog_url,
//! fetch_type, feed_url?, extractor?, js_render?, language, weight,
//! enabled}`." Grounded on the shape of [`crate::config::Settings::load`]
//! (YAML file, serde defaults), applied to a standalone sources file rather
//! than the main settings tree since the source list is data, not runtime
//! configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::models::FetchType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSourceConfig {
    pub name: String,
    pub company: String,
    pub blog_url: String,
    pub fetch_type: FetchType,
    #[serde(default)]
    pub feed_url: Option<String>,
    #[serde(default)]
    pub extractor: Option<String>,
    #[serde(default)]
    pub js_render: bool,
    #[serde(default = "NewsSourceConfig::default_language")]
    pub language: String,
    #[serde(default = "NewsSourceConfig::default_weight")]
    pub weight: f32,
    #[serde(default = "NewsSourceConfig::default_enabled")]
    pub enabled: bool,
}

impl NewsSourceConfig {
    fn default_language() -> String {
        "en".to_string()
    }
    fn default_weight() -> f32 {
        1.0
    }
    fn default_enabled() -> bool {
        true
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsSourcesFile {
    #[serde(default)]
    pub sources: Vec<NewsSourceConfig>,
}

/// Load the source list from a YAML file; a missing file yields an empty
/// list rather than an error, since a fresh deployment may not have
/// customized it yet.
pub async fn load_sources(path: &Path) -> CoreResult<Vec<NewsSourceConfig>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CoreError::Io(e)),
    };
    let file: NewsSourcesFile = serde_yaml::from_str(&raw)
        .map_err(|e| CoreError::ConfigInvalid(format!("parsing {}: {e}", path.display())))?;
    Ok(file.sources.into_iter().filter(|s| s.enabled).collect())
}

pub fn feed_sources(sources: &[NewsSourceConfig]) -> Vec<&NewsSourceConfig> {
    sources.iter().filter(|s| s.fetch_type == FetchType::Feed).collect()
}

pub fn crawler_sources(sources: &[NewsSourceConfig]) -> Vec<&NewsSourceConfig> {
    sources.iter().filter(|s| s.fetch_type == FetchType::Crawler).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_sources_file_yields_empty_list() {
        let path = Path::new("/tmp/ai-insight-tracker-nonexistent-sources.yaml");
        let sources = load_sources(path).await.unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn partitions_by_fetch_type() {
        let feed = NewsSourceConfig {
            name: "a".into(),
            company: "A".into(),
            blog_url: "https://a.example".into(),
            fetch_type: FetchType::Feed,
            feed_url: Some("https://a.example/feed".into()),
            extractor: None,
            js_render: false,
            language: "en".into(),
            weight: 1.0,
            enabled: true,
        };
        let crawler = NewsSourceConfig { fetch_type: FetchType::Crawler, name: "b".into(), ..feed.clone() };
        let sources = vec![feed, crawler];
        assert_eq!(feed_sources(&sources).len(), 1);
        assert_eq!(crawler_sources(&sources).len(), 1);
    }
}
