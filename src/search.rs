//! Term search with retry.
//!
//! One term resolves to a set of PubMed ids. Transient failures are retried
//! under the configured search policy; a term that still fails is logged and
//! contributes nothing, so one bad term never stops the run.

use crate::config::ClientConfig;
use crate::entrez::EntrezApi;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Result of resolving one term
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// At least one id matched
    Hits(BTreeSet<String>),
    /// The search succeeded with zero matches
    NoHits,
    /// Every attempt failed; holds the last error message
    Failed(String),
}

impl SearchOutcome {
    /// Ids this outcome contributes; empty for no hits and failures.
    pub fn ids(&self) -> BTreeSet<String> {
        match self {
            SearchOutcome::Hits(ids) => ids.clone(),
            SearchOutcome::NoHits | SearchOutcome::Failed(_) => BTreeSet::new(),
        }
    }

    /// Short status label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            SearchOutcome::Hits(_) => "hits",
            SearchOutcome::NoHits => "no_hits",
            SearchOutcome::Failed(_) => "failed",
        }
    }
}

/// Resolves search terms against the literature service
pub struct SearchClient<'a, A: EntrezApi + ?Sized> {
    api: &'a A,
    config: &'a ClientConfig,
}

impl<'a, A: EntrezApi + ?Sized> SearchClient<'a, A> {
    pub fn new(api: &'a A, config: &'a ClientConfig) -> Self {
        Self { api, config }
    }

    /// Resolve one term, distinguishing no hits from failure.
    pub async fn resolve_outcome(&self, term: &str) -> SearchOutcome {
        let max_results = self.config.search_max_results;
        let result = self
            .config
            .search_retry
            .run("esearch", || self.api.search(term, max_results))
            .await;

        match result {
            Ok(page) if page.ids.is_empty() => {
                info!(term = term, "No hits");
                SearchOutcome::NoHits
            }
            Ok(page) => {
                if page.count > page.ids.len() {
                    warn!(
                        term = term,
                        count = page.count,
                        returned = page.ids.len(),
                        "Hit count exceeds the per-term cap; results truncated"
                    );
                }
                info!(term = term, hits = page.ids.len(), "Search complete");
                SearchOutcome::Hits(page.ids.into_iter().collect())
            }
            Err(e) => {
                warn!(term = term, error = %e, "Search failed; term contributes no ids");
                SearchOutcome::Failed(e.to_string())
            }
        }
    }

    /// Resolve one term to its id set. Failure and no hits both give an
    /// empty set.
    pub async fn resolve_term(&self, term: &str) -> BTreeSet<String> {
        self.resolve_outcome(term).await.ids()
    }
}
