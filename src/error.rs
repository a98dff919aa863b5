//! Crate-wide error taxonomy.
//!
//! Mirrors the error-kind table in the design notes: each row gets either its
//! own [`CoreError`] variant or, where the spec calls for a closed
//! classification (LLM failures), its own nested enum ([`LlmError`]).

use thiserror::Error;

/// Errors surfaced across task/phase boundaries.
///
/// Most subsystem failures are isolated locally (a single arXiv category, a
/// single news source, a single light-analysis item) and never reach this
/// type; it exists for the failures the spec marks "Propagated? yes".
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse failed: {0}")]
    ParseFeed(String),

    #[error("xml parse failed: {0}")]
    ParseXml(String),

    #[error("arxiv html fulltext unavailable: {0}")]
    HtmlFulltextUnavailable(String),

    #[error("arxiv paper not found: {0}")]
    PaperNotFound(String),

    #[error("failed to decode persisted file {path}: {reason}")]
    PersistenceDecode { path: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("notifier failed: {0}")]
    NotifierFailure(String),

    #[error("{0}")]
    Other(String),
}

/// Unified error taxonomy an `LlmClient` adapter must classify its own
/// failures into, per spec §6 ("a uniform error taxonomy").
#[derive(Debug, Error, Clone)]
pub enum LlmError {
    #[error("JSON parse failed: {0}")]
    Parse(String),

    #[error("API rate limited: {0}")]
    RateLimit(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Human-readable classification string used as `AnalyzedItem.analysis_error`.
    pub fn classify(&self) -> String {
        match self {
            LlmError::Parse(msg) => format!("JSON parse failed: {msg}"),
            LlmError::RateLimit(msg) => format!("API rate limited: {msg}"),
            LlmError::Timeout(msg) => format!("request timed out: {msg}"),
            LlmError::Auth(msg) => format!("authentication failed: {msg}"),
            LlmError::Other(msg) => msg.clone(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
