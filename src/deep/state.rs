//! Deep-analysis graph state, per spec §4.F's literal `State` record.
//!
//! Modeled per the REDESIGN FLAGS guidance: "a plain record with `kind: enum
//! {Supervisor, Researcher, Writer, Reviewer, End}` plus typed fields; the
//! transition function is a pure `State → (Node, State)`." `raw_research` is
//! a supplemented debug field (not in the distilled state shape) carrying
//! each research note verbatim for [`crate::models::DeepAnalysisResult`]'s
//! own `raw_research` field.

use chrono::{DateTime, Utc};

/// `supervisor_tools` from spec §4.F's node table is folded into
/// [`Node::Supervisor`] itself (see `nodes::supervisor`'s module doc) since
/// it has no separate decision point once supervisor tool-calling is
/// modeled as one `chat_structured` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Supervisor,
    Researcher,
    Writer,
    Reviewer,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    Research,
    Write,
    End,
}

/// One entry in the append-only supervisor message log.
#[derive(Debug, Clone)]
pub enum GraphMessage {
    System(String),
    User(String),
    Assistant { content: String, tool_call: Option<AssistantToolCall> },
    Tool { name: String, result: String },
}

#[derive(Debug, Clone)]
pub struct AssistantToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct DeepAnalysisState {
    pub paper_id: String,
    pub paper_title: String,
    pub paper_abstract: String,
    pub paper_html_url: Option<String>,

    pub requirements: Option<String>,

    pub paper_full_content: Option<String>,
    pub paper_tables_content: Option<String>,
    pub paper_figures_content: Option<String>,
    pub paper_sections_available: bool,
    pub paper_total_sections: usize,
    pub paper_references_count: usize,
    pub fulltext_parse_status: String,

    pub supervisor_messages: Vec<GraphMessage>,
    pub current_research_topic: Option<String>,
    pub research_notes: Vec<String>,
    pub research_iterations: u32,
    pub max_iterations: u32,

    pub write_iterations: u32,
    pub max_write_iterations: u32,
    pub draft_report: Option<String>,
    pub review_feedback: Option<String>,
    pub final_report: Option<String>,
    pub next_action: NextAction,
    pub analysis_started_at: DateTime<Utc>,

    /// Supplemental debug trail: every research note ever produced, kept
    /// even after compression, for [`crate::models::DeepAnalysisResult::raw_research`].
    pub raw_research: Vec<String>,
}

impl DeepAnalysisState {
    pub fn new(
        paper_id: String,
        paper_title: String,
        paper_abstract: String,
        paper_html_url: Option<String>,
        requirements: Option<String>,
        max_research_iterations: u32,
        max_write_iterations: u32,
    ) -> Self {
        Self {
            paper_id,
            paper_title,
            paper_abstract,
            paper_html_url,
            requirements,
            paper_full_content: None,
            paper_tables_content: None,
            paper_figures_content: None,
            paper_sections_available: false,
            paper_total_sections: 0,
            paper_references_count: 0,
            fulltext_parse_status: "unavailable".to_string(),
            supervisor_messages: Vec::new(),
            current_research_topic: None,
            research_notes: Vec::new(),
            research_iterations: 0,
            max_iterations: max_research_iterations,
            write_iterations: 0,
            max_write_iterations,
            draft_report: None,
            review_feedback: None,
            final_report: None,
            next_action: NextAction::Research,
            analysis_started_at: Utc::now(),
            raw_research: Vec::new(),
        }
    }

    pub fn numbered_research_notes(&self) -> String {
        self.research_notes
            .iter()
            .enumerate()
            .map(|(i, note)| format!("{}. {note}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
