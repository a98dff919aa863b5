//! The state-machine runner: drives [`DeepAnalysisState`] through the node
//! table from spec §4.F, entering at `supervisor` and stopping at `Node::End`
//! (reviewer approval, or `write_iterations >= max_write_iterations` forcing
//! END regardless, per spec).

use crate::deep::nodes::{run_researcher, run_reviewer, run_supervisor, run_writer, ResearcherTools};
use crate::deep::state::{DeepAnalysisState, Node};
use crate::llm::LlmClient;
use crate::prompts::PromptStore;

/// Dependencies for one graph run. `decision_client` is expected to be
/// configured at ~0.3 temperature (supervisor/researcher/reviewer) and
/// `writer_client` at ~0.5, per spec §4.F's temperature tuning note.
pub struct GraphDeps<'a> {
    pub decision_client: &'a dyn LlmClient,
    pub writer_client: &'a dyn LlmClient,
    pub store: &'a dyn PromptStore,
    pub researcher_tools: ResearcherTools<'a>,
}

/// Run the graph to completion. There is no node-count cap beyond the
/// research/write iteration caps already enforced by the reviewer and
/// researcher nodes themselves, matching the spec's node table exactly.
pub async fn run_graph(mut state: DeepAnalysisState, deps: &GraphDeps<'_>) -> DeepAnalysisState {
    let mut node = Node::Supervisor;

    loop {
        node = match node {
            Node::Supervisor => run_supervisor(&mut state, deps.decision_client, deps.store).await,
            Node::Researcher => {
                run_researcher(&mut state, deps.decision_client, deps.store, &deps.researcher_tools).await
            }
            Node::Writer => run_writer(&mut state, deps.writer_client, deps.store).await,
            Node::Reviewer => run_reviewer(&mut state, deps.decision_client, deps.store).await,
            Node::End => break,
        };
    }

    state
}
