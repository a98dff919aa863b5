//! One file per named role in the deep-analysis graph (spec §4.F's node table).

mod researcher;
mod reviewer;
mod supervisor;
mod writer;

pub use researcher::{run_researcher, ResearcherTools};
pub use reviewer::run_reviewer;
pub use supervisor::run_supervisor;
pub use writer::run_writer;
