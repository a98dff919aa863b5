//! Writer node, per spec §4.F: composes paper metadata + optional full
//! content/tables/figures + requirements + numbered research notes +
//! (on a revision pass) the prior draft and reviewer feedback, into one
//! long-form report. `client` is expected to already be configured at the
//! writer's temperature (~0.5 per spec) by the caller.

use crate::deep::state::{DeepAnalysisState, Node};
use crate::llm::{ChatMessage, LlmClient};
use crate::prompts::{keys, render, PromptStore};

pub async fn run_writer(state: &mut DeepAnalysisState, client: &dyn LlmClient, store: &dyn PromptStore) -> Node {
    let system = render(&store.get_or(keys::PAPER_WRITER, ""), &[("paper_title", &state.paper_title)]);

    let mut sections = vec![format!(
        "Paper: {}\nAbstract: {}",
        state.paper_title, state.paper_abstract
    )];
    if let Some(full_content) = &state.paper_full_content {
        sections.push(format!("Full content:\n{full_content}"));
    }
    if let Some(tables) = &state.paper_tables_content {
        sections.push(format!("Tables:\n{tables}"));
    }
    if let Some(figures) = &state.paper_figures_content {
        sections.push(format!("Figures:\n{figures}"));
    }
    if let Some(requirements) = &state.requirements {
        sections.push(format!("Requirements: {requirements}"));
    }
    sections.push(format!("Research notes:\n{}", state.numbered_research_notes()));
    if let Some(feedback) = &state.review_feedback {
        sections.push(format!(
            "Previous draft:\n{}\n\nReviewer feedback to address:\n{feedback}",
            state.draft_report.as_deref().unwrap_or("(none)")
        ));
    }

    let user_content = sections.join("\n\n");
    let messages = [ChatMessage::system(system), ChatMessage::user(user_content)];

    let draft = match client.chat(&messages).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "writer call failed, retaining previous draft");
            state.draft_report.clone().unwrap_or_else(|| "Report generation failed.".to_string())
        }
    };

    state.draft_report = Some(draft);
    state.write_iterations += 1;
    state.review_feedback = None;

    Node::Reviewer
}
