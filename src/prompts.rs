//! Prompt storage: opaque template strings resolved by dotted key, per spec
//! §1 ("Prompt storage: opaque template strings resolved by key"). Grounded
//! on `original_source/src/agents/prompt_loader.py`'s `PromptLoader`
//! registry (`"{module}.{category}.{name}"` keys) and
//! `original_source/src/prompts/{paper,news,report}.py`'s key set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Dotted registry keys this crate resolves against a [`PromptStore`].
pub mod keys {
    pub const PAPER_LIGHT_SYSTEM: &str = "paper.light.system";
    pub const PAPER_LIGHT_USER: &str = "paper.light.user";
    pub const PAPER_SUPERVISOR: &str = "paper.deep_analyzer.supervisor";
    pub const PAPER_RESEARCHER: &str = "paper.deep_analyzer.researcher";
    pub const PAPER_WRITER: &str = "paper.deep_analyzer.writer";
    pub const PAPER_REVIEWER: &str = "paper.deep_analyzer.reviewer";
    pub const NEWS_LIGHT_SYSTEM: &str = "news.light.system";
    pub const NEWS_LIGHT_USER: &str = "news.light.user";
    pub const REPORT_SYSTEM: &str = "report.system";
    pub const CATEGORY_SUMMARY_USER: &str = "report.category_summary.user";
    pub const NEWS_SUMMARY_USER: &str = "report.news_summary.user";
    pub const DAILY_SUMMARY_USER: &str = "report.daily_summary.user";
    pub const RESEARCH_COMPRESSION: &str = "paper.deep_analyzer.research_compression";
}

/// A template store resolved by dotted key, analogous to `PromptLoader.load`.
/// Callers substitute `{placeholder}` tokens in the returned string
/// themselves (this trait only resolves raw templates).
pub trait PromptStore: Send + Sync {
    /// Looks up `key`; returns `None` if the key is unregistered.
    fn get(&self, key: &str) -> Option<String>;

    /// Like [`PromptStore::get`] but falls back to `default` with a warning,
    /// matching `PromptLoader.load`'s `default` parameter.
    fn get_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(prompt) => prompt,
            None => {
                warn!(key, "prompt not registered, using default");
                default.to_string()
            }
        }
    }
}

/// Substitute `{name}` placeholders in `template` from `vars`, leaving any
/// unmatched placeholder untouched.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// Built-in default templates, used when a [`PromptStore`] has no override
/// for a given key. These are the crate's own prose (not translated from the
/// original Chinese-language templates) so the repo carries no
/// non-English string literals outside of data it fetches.
fn builtin_defaults() -> HashMap<&'static str, &'static str> {
    use keys::*;
    HashMap::from([
        (
            PAPER_LIGHT_SYSTEM,
            "You are a research assistant summarizing an arXiv paper for a daily \
             digest in {language}. Respond with structured JSON matching the \
             requested schema only.",
        ),
        (
            PAPER_LIGHT_USER,
            "Title: {title}\n\nAbstract: {abstract}\n\nSummarize this paper for the digest.",
        ),
        (
            PAPER_SUPERVISOR,
            "You are the supervisor of a paper deep-analysis workflow. Decide \
             whether more research is needed (call conduct_research) or enough is \
             known to write the report (call research_complete). Paper: {paper_title}.",
        ),
        (
            PAPER_RESEARCHER,
            "You are the researcher. Investigate {topic} using the available tools, \
             then summarize findings concisely.",
        ),
        (
            PAPER_WRITER,
            "You are the writer. Compose a long-form analysis report for \
             {paper_title} from the supplied paper context and research notes.",
        ),
        (
            PAPER_REVIEWER,
            "You are the reviewer. Either approve the draft (call approve_report) or \
             request specific revisions (call request_revision).",
        ),
        (
            NEWS_LIGHT_SYSTEM,
            "You are a news analyst summarizing an AI-industry news item for a daily \
             digest in {language}. Respond with structured JSON matching the \
             requested schema only.",
        ),
        (
            NEWS_LIGHT_USER,
            "Title: {title}\nSource: {source}\nSummary: {summary}\n\nAnalyze this item.",
        ),
        (
            REPORT_SYSTEM,
            "You are an editor producing a concise daily AI research digest summary.",
        ),
        (
            CATEGORY_SUMMARY_USER,
            "Category: {category}\n\nPapers:\n{papers}\n\nWrite a 200-300 character prose summary of today's activity in this category.",
        ),
        (
            NEWS_SUMMARY_USER,
            "News items:\n{news}\n\nWrite a concise summary of today's AI-industry news.",
        ),
        (
            DAILY_SUMMARY_USER,
            "Category summaries:\n{category_summaries}\n\nNews summary:\n{news_summary}\n\nSynthesize a single daily summary.",
        ),
        (
            RESEARCH_COMPRESSION,
            "Compress the following research note to at most 500 characters, \
             preserving the key facts:\n\n{note}",
        ),
    ])
}

/// Reference implementation: built-in defaults, optionally overridden by
/// `{key}.txt` files under a directory (one file per dotted key, dots
/// replaced with `/` in the path — e.g. `paper/light/system.txt`).
pub struct FilePromptStore {
    overrides: HashMap<String, String>,
    defaults: HashMap<&'static str, &'static str>,
}

impl FilePromptStore {
    pub fn new() -> Self {
        Self { overrides: HashMap::new(), defaults: builtin_defaults() }
    }

    /// Load overrides from `dir`, where each registered key may have a
    /// corresponding `{dir}/{key-with-dots-as-slashes}.txt` file.
    pub async fn load_overrides(mut self, dir: &Path) -> Self {
        for key in builtin_defaults().keys() {
            let path = key_to_path(dir, key);
            if let Ok(content) = tokio::fs::read_to_string(&path).await {
                self.overrides.insert(key.to_string(), content);
            }
        }
        self
    }
}

impl Default for FilePromptStore {
    fn default() -> Self {
        Self::new()
    }
}

fn key_to_path(dir: &Path, key: &str) -> PathBuf {
    let mut path = dir.to_path_buf();
    for segment in key.split('.') {
        path.push(segment);
    }
    path.set_extension("txt");
    path
}

impl PromptStore for FilePromptStore {
    fn get(&self, key: &str) -> Option<String> {
        if let Some(overridden) = self.overrides.get(key) {
            return Some(overridden.clone());
        }
        self.defaults.get(key).map(|s| s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_named_placeholders() {
        let out = render("Hello {name}, you are {age}", &[("name", "Ada"), ("age", "36")]);
        assert_eq!(out, "Hello Ada, you are 36");
    }

    #[test]
    fn render_leaves_unmatched_placeholders() {
        let out = render("Hello {name}", &[]);
        assert_eq!(out, "Hello {name}");
    }

    #[test]
    fn builtin_store_resolves_known_keys() {
        let store = FilePromptStore::new();
        assert!(store.get(keys::PAPER_LIGHT_SYSTEM).is_some());
        assert!(store.get("nonexistent.key").is_none());
    }

    #[test]
    fn get_or_falls_back_on_missing_key() {
        let store = FilePromptStore::new();
        let value = store.get_or("missing.key", "fallback");
        assert_eq!(value, "fallback");
    }

    #[tokio::test]
    async fn file_overrides_take_precedence_over_defaults() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("ai_insight_tracker-test-prompts-{}", std::process::id()));
        let target = key_to_path(&dir, keys::PAPER_LIGHT_SYSTEM);
        tokio::fs::create_dir_all(target.parent().unwrap()).await.unwrap();
        tokio::fs::write(&target, "custom override").await.unwrap();

        let store = FilePromptStore::new().load_overrides(&dir).await;
        assert_eq!(store.get(keys::PAPER_LIGHT_SYSTEM).as_deref(), Some("custom override"));

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
