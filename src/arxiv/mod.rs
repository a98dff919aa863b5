//! arXiv ingestion: Atom API client with pagination, a single in-flight
//! rate gate, and an HTML fulltext fetcher/parser used by the deep-analysis
//! workflow.
//!
//! Grounded on `original_source/src/data_fetchers/arxiv/{client,query,
//! html_fulltext}.py` (`AsyncArxivClient`) for pagination/backoff/rate-gate
//! semantics, and on `dashflow-arxiv`'s `quick_xml::Reader` event-loop style
//! for Atom parsing.

mod atom;
mod client;
mod fulltext;
mod gate;
mod query;

pub use client::ArxivClient;
pub use fulltext::fetch_html_fulltext;
pub use gate::RateGate;
