//! Run-scoped "current paper" binding for the `paper_reader` tool, per spec
//! §5: "Global 'current paper' reference used by `paper_reader`: `set_current_paper
//! / get / clear`. MUST be cleared in a `finally`-style block at the end of
//! each deep-analysis invocation. ... concurrent deep-analysis runs in the
//! same process are NOT supported by contract."
//!
//! Modeled as a single process-wide slot rather than per-run state, matching
//! that contract exactly; [`CurrentPaperGuard`]'s `Drop` impl is the
//! `finally`-style clear, so it fires on early return or panic unwind alike.

use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio::sync::Mutex;

use crate::models::ArxivHtmlFulltext;

static CURRENT_PAPER: Lazy<Mutex<Option<Arc<ArxivHtmlFulltext>>>> = Lazy::new(|| Mutex::new(None));

/// Holds the process-wide "current paper" slot for the lifetime of one
/// deep-analysis run. Clears the slot on drop, including panic unwind.
pub struct CurrentPaperGuard {
    _private: (),
}

impl CurrentPaperGuard {
    /// Bind `fulltext` as the current paper and return a guard that clears
    /// it again when dropped.
    pub async fn bind(fulltext: Arc<ArxivHtmlFulltext>) -> Self {
        let mut slot = CURRENT_PAPER.lock().await;
        *slot = Some(fulltext);
        Self { _private: () }
    }
}

impl Drop for CurrentPaperGuard {
    fn drop(&mut self) {
        if let Ok(mut slot) = CURRENT_PAPER.try_lock() {
            *slot = None;
        }
    }
}

/// Read the currently-bound paper, if any.
pub async fn current_paper() -> Option<Arc<ArxivHtmlFulltext>> {
    CURRENT_PAPER.lock().await.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArxivHtmlSource, ArxivHtmlStats};
    use chrono::Utc;

    fn sample() -> Arc<ArxivHtmlFulltext> {
        Arc::new(ArxivHtmlFulltext {
            paper_id: "2501.00001".into(),
            source: ArxivHtmlSource {
                provider: "arxiv-html".into(),
                url: "https://arxiv.org/html/2501.00001".into(),
                fetched_at: Utc::now(),
            },
            front_matter: vec!["overview".into()],
            sections: vec![],
            stats: ArxivHtmlStats::default(),
        })
    }

    #[tokio::test]
    async fn bind_makes_paper_readable_and_drop_clears_it() {
        assert!(current_paper().await.is_none());
        {
            let _guard = CurrentPaperGuard::bind(sample()).await;
            assert!(current_paper().await.is_some());
        }
        assert!(current_paper().await.is_none());
    }
}
