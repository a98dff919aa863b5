//! Core data model.
//!
//! Value types owned exclusively by whichever on-disk file or in-flight task
//! currently holds them (see spec §3 "Ownership"). Nothing here talks to the
//! filesystem or the network — that's [`crate::persistence`] and
//! [`crate::arxiv`]/[`crate::news`].

mod analysis;
mod deep;
mod news;
mod paper;
mod report;

pub use analysis::{
    AnalysisStatus, AnalyzedItem, AnalyzedNews, AnalyzedPaper, LightAnalysis, NewsAnalysis, NewsCategory,
    NewsSentiment, PaperAnalysis,
};
pub use deep::{ArxivHtmlFulltext, ArxivHtmlSection, ArxivHtmlSource, ArxivHtmlStats, DeepAnalysisResult};
pub use news::{FetchType, NewsItem};
pub use paper::Paper;
pub use report::{DailyReport, DailyStats};
