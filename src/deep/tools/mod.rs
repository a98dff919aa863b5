//! The three researcher tools from spec §4.F's ReAct loop.

mod arxiv_loader;
mod paper_reader;
mod web_search;

pub use arxiv_loader::load_arxiv_paper;
pub use paper_reader::{read_paper, PaperReaderInput};
pub use web_search::web_search;
