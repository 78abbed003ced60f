//! Reverse index from record id to the queries that found it.

use crate::record::PublicationRecord;
use std::collections::{BTreeSet, HashMap};

/// What a search term was built from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryOrigin {
    /// Author-name variation, e.g. `Doe JQ`
    Name(String),
    /// ORCID identifier
    Orcid(String),
}

impl QueryOrigin {
    /// Label written into a record's provenance list
    pub fn label(&self) -> &str {
        match self {
            QueryOrigin::Name(v) | QueryOrigin::Orcid(v) => v,
        }
    }
}

/// Record id -> labels of every query that returned it
#[derive(Debug, Clone, Default)]
pub struct ProvenanceIndex {
    by_id: HashMap<String, Vec<String>>,
}

impl ProvenanceIndex {
    /// Build the index from per-query id sets.
    ///
    /// Labels are kept in query order. The same label contributed by two
    /// identities appears twice.
    pub fn build<'a, I>(resolutions: I) -> Self
    where
        I: IntoIterator<Item = (&'a QueryOrigin, &'a BTreeSet<String>)>,
    {
        let mut by_id: HashMap<String, Vec<String>> = HashMap::new();
        for (origin, ids) in resolutions {
            for id in ids {
                by_id
                    .entry(id.clone())
                    .or_default()
                    .push(origin.label().to_string());
            }
        }
        Self { by_id }
    }

    /// Labels for one id; empty when no query returned it.
    pub fn labels(&self, id: &str) -> &[String] {
        self.by_id.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Set each record's provenance from the index.
    pub fn attach(&self, records: &mut [PublicationRecord]) {
        for record in records {
            record.provenance = self.labels(&record.pmid).to_vec();
        }
    }
}
