//! Core library for the daily research-intelligence pipeline: arXiv +
//! AI news ingestion, bounded-concurrency LLM light-analysis, daily report
//! aggregation, and an on-demand multi-agent deep-analysis workflow.
//!
//! The two binaries in `src/bin/` are thin `clap` shells over
//! [`pipeline::run_daily_task`] and [`deep::run_deep_analysis`].

pub mod analysis;
pub mod arxiv;
pub mod config;
pub mod deep;
pub mod error;
pub mod ids;
pub mod llm;
pub mod models;
pub mod news;
pub mod notifier;
pub mod persistence;
pub mod pipeline;
pub mod prompts;
pub mod report;
