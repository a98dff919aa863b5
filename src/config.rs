//! Configuration loading: YAML file, layered under environment variables,
//! layered under hard-coded defaults (precedence: file > env > defaults),
//! mirroring the teacher's `config_dir()`/`load_config` shape in `main.rs`.

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArxivConfig {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "ArxivConfig::default_max_results")]
    pub max_results: u32,
    #[serde(default = "ArxivConfig::default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "ArxivConfig::default_request_delay")]
    pub request_delay: f64,
    #[serde(default = "ArxivConfig::default_timeout")]
    pub timeout: f64,
}

impl ArxivConfig {
    fn default_max_results() -> u32 {
        100
    }
    fn default_max_pages() -> u32 {
        20
    }
    fn default_request_delay() -> f64 {
        3.0
    }
    fn default_timeout() -> f64 {
        60.0
    }
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            max_results: Self::default_max_results(),
            max_pages: Self::default_max_pages(),
            request_delay: Self::default_request_delay(),
            timeout: Self::default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchApi {
    Tavily,
    Duckduckgo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "SearchConfig::default_api")]
    pub api: SearchApi,
    #[serde(default)]
    pub tavily_api_key: Option<String>,
    #[serde(default = "SearchConfig::default_max_results")]
    pub max_results: u32,
    #[serde(default = "SearchConfig::default_timeout")]
    pub timeout: f64,
}

impl SearchConfig {
    fn default_api() -> SearchApi {
        SearchApi::Duckduckgo
    }
    fn default_max_results() -> u32 {
        5
    }
    fn default_timeout() -> f64 {
        30.0
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api: Self::default_api(),
            tavily_api_key: None,
            max_results: Self::default_max_results(),
            timeout: Self::default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "AnalysisConfig::default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "AnalysisConfig::default_timeout")]
    pub timeout: f64,
    #[serde(default = "AnalysisConfig::default_max_research_iterations")]
    pub max_research_iterations: u32,
    #[serde(default = "AnalysisConfig::default_max_write_iterations")]
    pub max_write_iterations: u32,
}

impl AnalysisConfig {
    fn default_max_concurrent() -> usize {
        20
    }
    fn default_timeout() -> f64 {
        60.0
    }
    fn default_max_research_iterations() -> u32 {
        5
    }
    fn default_max_write_iterations() -> u32 {
        3
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_concurrent: Self::default_max_concurrent(),
            timeout: Self::default_timeout(),
            max_research_iterations: Self::default_max_research_iterations(),
            max_write_iterations: Self::default_max_write_iterations(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLanguage {
    Zh,
    En,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub feishu_webhook_url: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default = "NotificationConfig::default_language")]
    pub language: NotificationLanguage,
    #[serde(default = "NotificationConfig::default_max_papers")]
    pub max_papers: u32,
    #[serde(default = "NotificationConfig::default_max_news")]
    pub max_news: u32,
    #[serde(default = "NotificationConfig::default_timeout")]
    pub timeout: f64,
    #[serde(default = "NotificationConfig::default_max_retries")]
    pub max_retries: u32,
}

impl NotificationConfig {
    fn default_language() -> NotificationLanguage {
        NotificationLanguage::En
    }
    fn default_max_papers() -> u32 {
        10
    }
    fn default_max_news() -> u32 {
        5
    }
    fn default_timeout() -> f64 {
        30.0
    }
    fn default_max_retries() -> u32 {
        3
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            feishu_webhook_url: None,
            site_url: None,
            language: Self::default_language(),
            max_papers: Self::default_max_papers(),
            max_news: Self::default_max_news(),
            timeout: Self::default_timeout(),
            max_retries: Self::default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    #[serde(default = "NewsConfig::default_hours")]
    pub hours: u32,
    #[serde(default = "NewsConfig::default_rss_timeout")]
    pub rss_timeout: f64,
    #[serde(default = "NewsConfig::default_rss_max_concurrent")]
    pub rss_max_concurrent: usize,
    #[serde(default = "NewsConfig::default_crawler_max_concurrent")]
    pub crawler_max_concurrent: usize,
    #[serde(default = "NewsConfig::default_crawler_timeout")]
    pub crawler_timeout: f64,
    #[serde(default = "NewsConfig::default_headless")]
    pub headless: bool,
}

impl NewsConfig {
    fn default_hours() -> u32 {
        168
    }
    fn default_rss_timeout() -> f64 {
        30.0
    }
    fn default_rss_max_concurrent() -> usize {
        10
    }
    fn default_crawler_max_concurrent() -> usize {
        3
    }
    fn default_crawler_timeout() -> f64 {
        60.0
    }
    fn default_headless() -> bool {
        true
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            hours: Self::default_hours(),
            rss_timeout: Self::default_rss_timeout(),
            rss_max_concurrent: Self::default_rss_max_concurrent(),
            crawler_max_concurrent: Self::default_crawler_max_concurrent(),
            crawler_timeout: Self::default_crawler_timeout(),
            headless: Self::default_headless(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    #[serde(default = "AdvancedConfig::default_llm_timeout")]
    pub llm_timeout: f64,
    #[serde(default = "AdvancedConfig::default_llm_max_retries")]
    pub llm_max_retries: u32,
    #[serde(default = "AdvancedConfig::default_rss_hours")]
    pub rss_hours: u32,
    #[serde(default = "AdvancedConfig::default_rss_max_concurrent")]
    pub rss_max_concurrent: usize,
    #[serde(default = "AdvancedConfig::default_rss_timeout")]
    pub rss_timeout: f64,
}

impl AdvancedConfig {
    fn default_llm_timeout() -> f64 {
        60.0
    }
    fn default_llm_max_retries() -> u32 {
        3
    }
    fn default_rss_hours() -> u32 {
        24
    }
    fn default_rss_max_concurrent() -> usize {
        20
    }
    fn default_rss_timeout() -> f64 {
        30.0
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            llm_timeout: Self::default_llm_timeout(),
            llm_max_retries: Self::default_llm_max_retries(),
            rss_hours: Self::default_rss_hours(),
            rss_max_concurrent: Self::default_rss_max_concurrent(),
            rss_timeout: Self::default_rss_timeout(),
        }
    }
}

/// Root settings tree, per spec §6 "Configuration (enumerated options)".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub arxiv: ArxivConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,

    /// Daily arXiv time window in hours; env override `ARXIV_HOURS`.
    #[serde(default = "Settings::default_arxiv_hours")]
    pub arxiv_hours: u32,
    #[serde(default)]
    pub github_repository: Option<String>,
    #[serde(default)]
    pub github_repository_owner: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
}

impl Settings {
    fn default_arxiv_hours() -> u32 {
        25
    }

    /// Load from an optional YAML path, then apply environment overrides,
    /// then validate. `path = None` starts from pure defaults.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        Self::load_with_validation(path, true)
    }

    /// Like [`Settings::load`], but `validate` can be set to `false` to skip
    /// the validation step entirely (the CLI's `--skip-config-check` flag).
    pub fn load_with_validation(path: Option<&Path>, validate: bool) -> CoreResult<Self> {
        let mut settings = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)
                    .map_err(|e| CoreError::ConfigInvalid(format!("reading {}: {e}", p.display())))?;
                serde_yaml::from_str(&raw)
                    .map_err(|e| CoreError::ConfigInvalid(format!("parsing {}: {e}", p.display())))?
            }
            Some(p) => {
                return Err(CoreError::ConfigInvalid(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            None => Settings::default(),
        };

        settings.apply_env_overrides();
        if validate {
            settings.validate()?;
        }
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("ARXIV_HOURS") {
            if let Ok(n) = v.parse() {
                self.arxiv_hours = n;
            }
        }
        if let Ok(v) = env::var("GITHUB_REPOSITORY") {
            self.github_repository = Some(v);
        }
        if let Ok(v) = env::var("GITHUB_REPOSITORY_OWNER") {
            self.github_repository_owner = Some(v);
        }
        if let Ok(v) = env::var("SITE_URL") {
            self.site_url = Some(v);
        }
        if let Ok(v) = env::var("LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = env::var("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = env::var("LLM_API_KEY") {
            self.llm.api_key = v;
        }
        if let Ok(v) = env::var("FEISHU_WEBHOOK_URL") {
            self.notification.feishu_webhook_url = Some(v);
        }
        if let Ok(v) = env::var("TAVILY_API_KEY") {
            self.search.tavily_api_key = Some(v);
        }
    }

    /// Validation producing `CoreError::ConfigInvalid`, mapped to exit code 1
    /// by the CLI entry points.
    pub fn validate(&self) -> CoreResult<()> {
        if self.llm.provider.trim().is_empty() {
            return Err(CoreError::ConfigInvalid("llm.provider is required".into()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(CoreError::ConfigInvalid("llm.model is required".into()));
        }
        if self.llm.api_key.trim().is_empty() {
            return Err(CoreError::ConfigInvalid("llm.api_key is required".into()));
        }
        if self.analysis.max_concurrent == 0 {
            return Err(CoreError::ConfigInvalid(
                "analysis.max_concurrent must be >= 1".into(),
            ));
        }
        if self.search.api == SearchApi::Tavily && self.search.tavily_api_key.is_none() {
            return Err(CoreError::ConfigInvalid(
                "search.tavily_api_key is required when search.api = tavily".into(),
            ));
        }
        Ok(())
    }
}
