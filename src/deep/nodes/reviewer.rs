//! Reviewer node, per spec §4.F. Tool contract: `approve_report(comment?)`
//! or `request_revision(feedback)`; "if neither is called, default approve."

use serde_json::{json, Value};

use crate::deep::state::{DeepAnalysisState, NextAction, Node};
use crate::llm::{chat_structured_as, ChatMessage, LlmClient};
use crate::prompts::{keys, PromptStore};

#[derive(Debug, serde::Deserialize)]
struct ReviewDecision {
    action: String,
    #[serde(default)]
    feedback: Option<String>,
}

fn decision_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["approve", "request_revision"]},
            "feedback": {"type": "string"},
        },
        "required": ["action"],
    })
}

pub async fn run_reviewer(state: &mut DeepAnalysisState, client: &dyn LlmClient, store: &dyn PromptStore) -> Node {
    let system = store.get_or(keys::PAPER_REVIEWER, "");
    let draft = state.draft_report.as_deref().unwrap_or("(no draft)");
    let messages = [ChatMessage::system(system), ChatMessage::user(format!("Draft report:\n\n{draft}"))];

    let decision = chat_structured_as::<ReviewDecision>(client, &messages, &decision_schema()).await;

    let approve = match &decision {
        Ok(decision) => decision.action != "request_revision",
        Err(e) => {
            tracing::warn!(error = %e, "reviewer decision call failed, defaulting to approve");
            true
        }
    };

    if approve || state.write_iterations >= state.max_write_iterations {
        state.final_report = state.draft_report.clone();
        state.next_action = NextAction::End;
        Node::End
    } else {
        state.review_feedback = decision.ok().and_then(|d| d.feedback);
        state.next_action = NextAction::Write;
        Node::Writer
    }
}
