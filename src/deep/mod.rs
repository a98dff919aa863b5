//! On-demand multi-agent deep-analysis workflow, per spec §4.F: an
//! HTML-fulltext preprocessing step feeding a supervisor/researcher/writer/
//! reviewer graph, producing one long-form [`DeepAnalysisResult`].

mod current_paper;
mod graph;
mod nodes;
mod state;
mod tools;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::instrument;

use crate::arxiv::{fetch_html_fulltext, ArxivClient};
use crate::config::Settings;
use crate::error::{CoreError, CoreResult};
use crate::llm::{LlmClient, OpenAiCompatibleClient, RetryPolicy};
use crate::models::{ArxivHtmlFulltext, ArxivHtmlSection, DeepAnalysisResult};
use crate::prompts::PromptStore;

pub use current_paper::{current_paper, CurrentPaperGuard};
pub use graph::{run_graph, GraphDeps};
pub use nodes::ResearcherTools;
pub use state::{DeepAnalysisState, GraphMessage, NextAction, Node};

const DECISION_TEMPERATURE: f32 = 0.3;
const WRITER_TEMPERATURE: f32 = 0.5;

fn build_client(settings: &Settings, temperature: f32) -> OpenAiCompatibleClient {
    OpenAiCompatibleClient::new(settings.llm.provider.clone(), settings.llm.model.clone(), settings.llm.api_key.clone())
        .with_temperature(temperature)
        .with_timeout(Duration::from_secs_f64(settings.advanced.llm_timeout))
        .with_retry_policy(RetryPolicy::new(settings.advanced.llm_max_retries, Duration::from_secs(1)))
}

fn count_sections(sections: &[ArxivHtmlSection]) -> usize {
    sections.iter().map(|s| 1 + count_sections(&s.children)).sum()
}

fn render_full_content(fulltext: &ArxivHtmlFulltext) -> String {
    let mut out = fulltext.overview();
    for section in &fulltext.sections {
        render_section_into(section, &mut out);
    }
    out
}

fn render_section_into(section: &ArxivHtmlSection, out: &mut String) {
    out.push_str(&format!("\n\n## {}\n\n{}", section.heading, section.text()));
    for child in &section.children {
        render_section_into(child, out);
    }
}

/// Run one deep-analysis invocation end to end: fetch paper metadata and HTML
/// fulltext (a hard failure here aborts the whole run, per spec §4.D/§4.F),
/// drive the node graph, and assemble the persisted result. The "current
/// paper" binding is released (even on error, via [`CurrentPaperGuard`]'s
/// `Drop`) before this function returns.
#[instrument(level = "info", skip(settings, store), fields(paper_id))]
pub async fn run_deep_analysis(
    paper_id: &str,
    requirements: Option<String>,
    settings: &Settings,
    store: &dyn PromptStore,
) -> CoreResult<DeepAnalysisResult> {
    let started_at = Utc::now();

    let arxiv_client = ArxivClient::new(&settings.arxiv)?;
    let papers = arxiv_client.fetch_by_ids(&[paper_id.to_string()]).await?;
    let paper = papers
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::PaperNotFound(paper_id.to_string()))?;

    let http = reqwest::Client::new();
    let fulltext = fetch_html_fulltext(&http, paper_id).await?;
    let fulltext_total_sections = count_sections(&fulltext.sections);
    let full_content = render_full_content(&fulltext);
    let fulltext = Arc::new(fulltext);

    let mut state = DeepAnalysisState::new(
        paper.id.clone(),
        paper.title.clone(),
        paper.abstract_text.clone(),
        Some(paper.abs_url.clone()),
        requirements,
        settings.analysis.max_research_iterations,
        settings.analysis.max_write_iterations,
    );
    state.paper_sections_available = fulltext_total_sections > 0;
    state.paper_total_sections = fulltext_total_sections;
    state.fulltext_parse_status = "success".to_string();
    state.paper_full_content = Some(full_content);
    state.analysis_started_at = started_at;

    let _guard = CurrentPaperGuard::bind(fulltext.clone()).await;

    let decision_client = build_client(settings, DECISION_TEMPERATURE);
    let writer_client = build_client(settings, WRITER_TEMPERATURE);
    let researcher_tools = ResearcherTools {
        arxiv_client: &arxiv_client,
        arxiv_timeout: Duration::from_secs_f64(settings.arxiv.timeout),
        search_config: &settings.search,
        current_paper: Some(fulltext.clone()),
    };

    let deps = GraphDeps {
        decision_client: &decision_client as &dyn LlmClient,
        writer_client: &writer_client as &dyn LlmClient,
        store,
        researcher_tools,
    };

    let final_state = run_graph(state, &deps).await;
    let duration_secs = (Utc::now() - started_at).num_milliseconds() as f64 / 1000.0;

    Ok(DeepAnalysisResult {
        paper_id: final_state.paper_id,
        paper_title: final_state.paper_title,
        report: final_state
            .final_report
            .or(final_state.draft_report)
            .unwrap_or_else(|| "Deep analysis produced no report.".to_string()),
        research_iterations: final_state.research_iterations,
        write_iterations: final_state.write_iterations,
        analyzed_at: Utc::now(),
        duration_secs,
        llm_provider: settings.llm.provider.clone(),
        llm_model: settings.llm.model.clone(),
        fulltext_parse_status: final_state.fulltext_parse_status,
        paper_total_sections: final_state.paper_total_sections,
        paper_html_url: final_state.paper_html_url.unwrap_or_default(),
        raw_research: final_state.raw_research,
    })
}
