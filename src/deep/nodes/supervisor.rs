//! Supervisor node, per spec §4.F's `supervisor`/`supervisor_tools` pair.
//!
//! The graph's own `LlmClient` abstraction only exposes a single
//! structured-output call shape (`chat_structured`), not a multi-tool
//! function-calling API, so the two nodes collapse into one: the
//! "supervisor tool call" is modeled directly as the decision schema below,
//! and routing on its `action` *is* the `supervisor_tools` node.
//!
//! Tool contract (spec §4.F): `conduct_research(topic)` routes to the
//! researcher; `research_complete(summary)` routes to the writer. A decision
//! the model declines to make (missing/invalid `action`) defaults to research.

use serde_json::{json, Value};

use crate::deep::state::{DeepAnalysisState, GraphMessage, NextAction, Node};
use crate::llm::{chat_structured_as, ChatMessage, LlmClient};
use crate::prompts::{keys, render, PromptStore};

#[derive(Debug, serde::Deserialize)]
struct SupervisorDecision {
    action: String,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

fn decision_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["conduct_research", "research_complete"]},
            "topic": {"type": "string"},
            "summary": {"type": "string"},
        },
        "required": ["action"],
    })
}

pub async fn run_supervisor(
    state: &mut DeepAnalysisState,
    client: &dyn LlmClient,
    store: &dyn PromptStore,
) -> Node {
    let system = render(
        &store.get_or(keys::PAPER_SUPERVISOR, ""),
        &[("paper_title", &state.paper_title)],
    );
    let mut messages = vec![ChatMessage::system(system)];
    messages.push(ChatMessage::user(format!(
        "Requirements: {}\n\nResearch notes so far:\n{}",
        state.requirements.as_deref().unwrap_or("(none)"),
        if state.research_notes.is_empty() { "(none yet)".to_string() } else { state.numbered_research_notes() }
    )));

    let decision = match chat_structured_as::<SupervisorDecision>(client, &messages, &decision_schema()).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(error = %e, "supervisor decision call failed, defaulting to research");
            SupervisorDecision { action: "conduct_research".to_string(), topic: None, summary: None }
        }
    };

    match decision.action.as_str() {
        "research_complete" => {
            state.supervisor_messages.push(GraphMessage::Assistant {
                content: decision.summary.clone().unwrap_or_default(),
                tool_call: None,
            });
            state.next_action = NextAction::Write;
            Node::Writer
        }
        _ => {
            let topic = decision.topic.unwrap_or_else(|| state.paper_title.clone());
            state.supervisor_messages.push(GraphMessage::Assistant { content: topic.clone(), tool_call: None });
            state.current_research_topic = Some(topic);
            state.next_action = NextAction::Research;
            Node::Researcher
        }
    }
}
