//! Researcher node: the ReAct tool loop from spec §4.F, bounded by
//! `max_iterations_tools` (10). One call to [`run_researcher`] drives the
//! whole loop internally and returns control to the supervisor with exactly
//! one (possibly compressed) note appended to `research_notes`, matching the
//! node transition table's "appends one compressed note ... Next: supervisor".

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::arxiv::ArxivClient;
use crate::config::SearchConfig;
use crate::deep::state::{DeepAnalysisState, GraphMessage, Node};
use crate::deep::tools::{load_arxiv_paper, read_paper, web_search, PaperReaderInput};
use crate::llm::{chat_structured_as, ChatMessage, LlmClient};
use crate::models::ArxivHtmlFulltext;
use crate::prompts::{keys, render, PromptStore};

const MAX_TOOL_ITERATIONS: u32 = 10;
const COMPRESS_THRESHOLD_CHARS: usize = 1500;
const COMPRESSED_NOTE_CHARS: usize = 500;

/// The researcher's tool dependencies, threaded in rather than looked up
/// globally so the node stays testable with fakes.
pub struct ResearcherTools<'a> {
    pub arxiv_client: &'a ArxivClient,
    pub arxiv_timeout: Duration,
    pub search_config: &'a SearchConfig,
    pub current_paper: Option<Arc<ArxivHtmlFulltext>>,
}

#[derive(Debug, serde::Deserialize)]
struct ReactStep {
    action: String,
    #[serde(default)]
    tool: Option<String>,
    #[serde(default)]
    arguments: Value,
    #[serde(default)]
    response: Option<String>,
}

fn react_schema(paper_sections_available: bool) -> Value {
    let mut tools = vec!["web_search", "arxiv_loader"];
    if paper_sections_available {
        tools.push("paper_reader");
    }
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": ["tool", "respond"]},
            "tool": {"type": "string", "enum": tools},
            "arguments": {"type": "object"},
            "response": {"type": "string"},
        },
        "required": ["action"],
    })
}

pub async fn run_researcher(
    state: &mut DeepAnalysisState,
    client: &dyn LlmClient,
    store: &dyn PromptStore,
    tools: &ResearcherTools<'_>,
) -> Node {
    let topic = state.current_research_topic.clone().unwrap_or_else(|| state.paper_title.clone());
    let system = render(&store.get_or(keys::PAPER_RESEARCHER, ""), &[("topic", &topic)]);

    let mut transcript: Vec<ChatMessage> = vec![ChatMessage::system(system)];
    transcript.push(ChatMessage::user(format!("Research topic: {topic}")));

    let mut last_response = String::new();

    for _iteration in 0..MAX_TOOL_ITERATIONS {
        let step = match chat_structured_as::<ReactStep>(
            client,
            &transcript,
            &react_schema(state.paper_sections_available),
        )
        .await
        {
            Ok(step) => step,
            Err(e) => {
                tracing::warn!(error = %e, "researcher step failed, ending loop");
                break;
            }
        };

        if step.action == "respond" {
            last_response = step.response.unwrap_or_default();
            break;
        }

        let Some(tool_name) = step.tool.as_deref() else {
            last_response = step.response.unwrap_or_default();
            break;
        };

        let result = run_tool(tool_name, &step.arguments, tools).await;
        transcript.push(ChatMessage::assistant(format!("calling {tool_name}({})", step.arguments)));
        transcript.push(ChatMessage::user(format!("Tool result from {tool_name}:\n{result}")));
        state.supervisor_messages.push(GraphMessage::Tool { name: tool_name.to_string(), result });
    }

    if last_response.is_empty() {
        last_response = "No findings (researcher made no progress within the tool budget).".to_string();
    }

    let note = if last_response.chars().count() > COMPRESS_THRESHOLD_CHARS {
        compress_note(client, store, &last_response).await
    } else {
        last_response
    };

    state.raw_research.push(note.clone());
    state.research_notes.push(note);
    state.research_iterations += 1;
    state.current_research_topic = None;

    Node::Supervisor
}

async fn run_tool(name: &str, arguments: &Value, tools: &ResearcherTools<'_>) -> String {
    match name {
        "web_search" => {
            let queries: Vec<String> = arguments
                .get("queries")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).take(3).collect())
                .unwrap_or_default();
            if queries.is_empty() {
                return "web_search requires a non-empty 'queries' array".to_string();
            }
            web_search(&queries, tools.search_config).await
        }
        "arxiv_loader" => {
            let Some(paper_id) = arguments.get("paper_id").and_then(|v| v.as_str()) else {
                return "arxiv_loader requires a 'paper_id' string".to_string();
            };
            load_arxiv_paper(tools.arxiv_client, paper_id, tools.arxiv_timeout).await
        }
        "paper_reader" => {
            let Some(fulltext) = tools.current_paper.as_deref() else {
                return "paper_reader is unavailable: no paper sections bound for this run".to_string();
            };
            let input = PaperReaderInput {
                section: arguments.get("section").and_then(|v| v.as_str()).map(str::to_string),
                keyword: arguments.get("keyword").and_then(|v| v.as_str()).map(str::to_string),
                include_tables: arguments.get("include_tables").and_then(|v| v.as_bool()).unwrap_or(false),
                include_figures: arguments.get("include_figures").and_then(|v| v.as_bool()).unwrap_or(false),
            };
            read_paper(fulltext, &input)
        }
        other => format!("unknown tool: {other}"),
    }
}

async fn compress_note(client: &dyn LlmClient, store: &dyn PromptStore, note: &str) -> String {
    let prompt = render(&store.get_or(keys::RESEARCH_COMPRESSION, ""), &[("note", note)]);
    match client.chat(&[ChatMessage::user(prompt)]).await {
        Ok(compressed) => truncate_chars(&compressed, COMPRESSED_NOTE_CHARS),
        Err(e) => {
            tracing::warn!(error = %e, "research note compression failed, truncating instead");
            truncate_chars(note, COMPRESSED_NOTE_CHARS)
        }
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
