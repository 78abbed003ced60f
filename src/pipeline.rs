//! End-to-end publication retrieval.
//!
//! identities -> terms -> per-term id sets -> deduplicated union -> batch
//! fetch -> per-record parse -> provenance. Every step runs sequentially:
//! one remote call in flight at a time, and retry waits hold up the run.

use crate::config::ClientConfig;
use crate::entrez::EntrezApi;
use crate::error::Result;
use crate::fetch::{split_records, BatchFetcher};
use crate::grants::GrantVariants;
use crate::provenance::{ProvenanceIndex, QueryOrigin};
use crate::record::{parse_record, ParsePolicy, PublicationRecord};
use crate::search::{SearchClient, SearchOutcome};
use crate::terms::Identity;
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};

/// One search term and the identity it was built for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTerm {
    /// Position of the identity in the input table
    pub identity: usize,
    /// `Last, First` of that identity
    pub display_name: String,
    pub origin: QueryOrigin,
    pub term: String,
}

/// A term together with what its search returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermResolution {
    pub planned: PlannedTerm,
    pub outcome: SearchOutcome,
}

impl TermResolution {
    /// Ids this term contributed
    pub fn ids(&self) -> BTreeSet<String> {
        self.outcome.ids()
    }

    fn outcome_ids(&self) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        match &self.outcome {
            SearchOutcome::Hits(ids) => ids,
            SearchOutcome::NoHits | SearchOutcome::Failed(_) => &EMPTY,
        }
    }
}

/// Everything one run produced
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// Per-term results, ORCID terms first, in planning order
    pub resolutions: Vec<TermResolution>,
    /// Parsed records, one per PMID, in fetch order
    pub records: Vec<PublicationRecord>,
    /// Records dropped under the lenient policy
    pub skipped: usize,
}

/// Build every search term: all ORCID terms first, then every name
/// variation of every identity.
///
/// A malformed date fails the whole plan.
pub fn plan_terms(identities: &[Identity]) -> Result<Vec<PlannedTerm>> {
    let mut planned = Vec::new();

    for (i, identity) in identities.iter().enumerate() {
        if let Some(term) = identity.orcid_term() {
            let orcid = identity.orcid.clone().unwrap_or_default();
            planned.push(PlannedTerm {
                identity: i,
                display_name: identity.display_name(),
                origin: QueryOrigin::Orcid(orcid),
                term: term?,
            });
        }
    }

    for (i, identity) in identities.iter().enumerate() {
        for variation in identity.name_variations() {
            let term = identity.name_term(&variation)?;
            planned.push(PlannedTerm {
                identity: i,
                display_name: identity.display_name(),
                origin: QueryOrigin::Name(variation),
                term,
            });
        }
    }

    Ok(planned)
}

/// Runs the retrieval pipeline against a literature service
pub struct Pipeline<'a, A: EntrezApi + ?Sized> {
    api: &'a A,
    config: &'a ClientConfig,
    grants: &'a GrantVariants,
    policy: ParsePolicy,
}

impl<'a, A: EntrezApi + ?Sized> Pipeline<'a, A> {
    pub fn new(api: &'a A, config: &'a ClientConfig, grants: &'a GrantVariants) -> Self {
        Self {
            api,
            config,
            grants,
            policy: ParsePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ParsePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve every planned term. Failed terms are kept with a
    /// `Failed` outcome.
    pub async fn resolve(&self, planned: Vec<PlannedTerm>) -> Vec<TermResolution> {
        let search = SearchClient::new(self.api, self.config);
        let total = planned.len();
        let mut resolutions = Vec::with_capacity(total);

        for (i, planned) in planned.into_iter().enumerate() {
            info!(
                term_index = i + 1,
                total = total,
                identity = %planned.display_name,
                query = planned.origin.label(),
                "Resolving term"
            );
            let outcome = search.resolve_outcome(&planned.term).await;
            resolutions.push(TermResolution { planned, outcome });
        }

        resolutions
    }

    /// Run the whole pipeline for a validated identity table.
    pub async fn run(&self, identities: &[Identity]) -> Result<PipelineOutput> {
        let planned = plan_terms(identities)?;
        info!(identities = identities.len(), terms = planned.len(), "Planned search terms");

        let resolutions = self.resolve(planned).await;
        let failed = resolutions
            .iter()
            .filter(|r| matches!(r.outcome, SearchOutcome::Failed(_)))
            .count();
        if failed > 0 {
            warn!(failed = failed, "Some terms failed and contributed no ids");
        }

        let union: BTreeSet<String> = resolutions
            .iter()
            .flat_map(|r| r.outcome_ids().iter().cloned())
            .collect();
        let ids: Vec<String> = union.into_iter().collect();
        info!(unique_ids = ids.len(), "Merged search results");

        let blob = BatchFetcher::new(self.api, self.config).fetch_all(&ids).await?;
        let (mut records, skipped) = self.parse_all(&blob)?;

        let index = ProvenanceIndex::build(
            resolutions
                .iter()
                .map(|r| (&r.planned.origin, r.outcome_ids())),
        );
        index.attach(&mut records);

        info!(records = records.len(), skipped = skipped, "Pipeline complete");
        Ok(PipelineOutput {
            resolutions,
            records,
            skipped,
        })
    }

    /// Parse every record in the fetched text, keeping the first record
    /// seen for each PMID.
    fn parse_all(&self, blob: &str) -> Result<(Vec<PublicationRecord>, usize)> {
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut skipped = 0;

        for raw in split_records(blob) {
            let record = match parse_record(&raw, self.grants, self.policy) {
                Ok(record) => record,
                Err(e) if self.policy == ParsePolicy::Lenient => {
                    warn!(error = %e, "Skipping unreadable record");
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if seen.insert(record.pmid.clone()) {
                records.push(record);
            } else {
                warn!(pmid = %record.pmid, "Duplicate record in fetch output; keeping the first");
            }
        }

        Ok((records, skipped))
    }
}
