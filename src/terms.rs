//! Search-term construction from researcher identity data.
//!
//! Turns one identity row into the set of author-name variations PubMed may
//! index the researcher under, and into the boolean query strings sent to
//! the search endpoint. Everything here is pure: identical inputs always
//! produce identical terms.

use crate::error::{PubmedError, Result};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Date format of identity start/end dates (two-digit year)
pub const INPUT_DATE_FORMAT: &str = "%m/%d/%y";

/// Date format used inside query terms
const TERM_DATE_FORMAT: &str = "%Y/%m/%d";

/// Upper bound used when an identity has no end date
pub const OPEN_END_SENTINEL: &str = "3000";

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid regex"));

/// One researcher row from the identity table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "lname")]
    pub last_name: String,
    #[serde(rename = "fname")]
    pub first_name: String,
    #[serde(rename = "mname", default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub affiliation: Option<String>,
    /// Start of the publication window, `MM/DD/YY`
    pub start: String,
    /// End of the publication window, `MM/DD/YY`; open-ended when absent
    #[serde(default)]
    pub end: Option<String>,
    /// ORCID in `dddd-dddd-dddd-dddd` form
    #[serde(default)]
    pub orcid: Option<String>,
}

impl Identity {
    /// Name variations for this identity.
    pub fn name_variations(&self) -> BTreeSet<String> {
        name_variations(
            &self.last_name,
            &self.first_name,
            self.middle_name.as_deref().unwrap_or(""),
        )
    }

    /// Author-clause search term for one of this identity's variations.
    pub fn name_term(&self, variation: &str) -> Result<String> {
        name_search_term(
            variation,
            &self.start,
            self.end.as_deref().unwrap_or(""),
            self.affiliation.as_deref().unwrap_or(""),
        )
    }

    /// Identifier-clause search term, when the identity has an ORCID.
    pub fn orcid_term(&self) -> Option<Result<String>> {
        self.orcid
            .as_deref()
            .filter(|o| !o.trim().is_empty())
            .map(|orcid| orcid_search_term(orcid, &self.start, self.end.as_deref().unwrap_or("")))
    }

    /// Short label for logs
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

/// Generate the author-name variations for a researcher.
///
/// Each name field is split on non-word characters, so hyphenated and
/// multi-part names contribute every part. The unbroken last name is always
/// a variation base too. Produces `Last F` for every last/first pair and,
/// when a middle name is present, `Last FM` and `Last M` as well.
///
/// # Examples
///
/// ```
/// use rustpubmed::terms::name_variations;
///
/// let v = name_variations("Smith-Jones", "Mary", "");
/// assert!(v.contains("Smith-Jones M"));
/// assert!(v.contains("Smith M"));
/// assert!(v.contains("Jones M"));
/// ```
pub fn name_variations(last: &str, first: &str, middle: &str) -> BTreeSet<String> {
    let mut last_names: Vec<&str> = WORD.find_iter(last).map(|m| m.as_str()).collect();
    last_names.push(last);

    let first_initials = initials(first);
    let middle_initials = initials(middle);

    let mut variations = BTreeSet::new();
    for l in &last_names {
        for f in &first_initials {
            variations.insert(format!("{} {}", l, f));
            for m in &middle_initials {
                variations.insert(format!("{} {}{}", l, f, m));
            }
        }
        for m in &middle_initials {
            variations.insert(format!("{} {}", l, m));
        }
    }
    variations
}

/// First character of every word in a name field
fn initials(name: &str) -> Vec<char> {
    WORD.find_iter(name)
        .filter_map(|m| m.as_str().chars().next())
        .collect()
}

/// Build the author search term for one name variation.
///
/// ```
/// use rustpubmed::terms::name_search_term;
///
/// let term = name_search_term("Jane Q", "01/01/20", "", "").unwrap();
/// assert_eq!(
///     term,
///     r#"("Jane Q"[Author]) AND ("2020/01/01"[Date - Publication] : 3000[Date - Publication])"#
/// );
/// ```
pub fn name_search_term(variation: &str, start: &str, end: &str, affiliation: &str) -> Result<String> {
    let (start, end) = term_date_range(start, end)?;
    let mut term = format!(
        r#"("{}"[Author]) AND ("{}"[Date - Publication] : {}[Date - Publication])"#,
        variation, start, end
    );
    if !affiliation.is_empty() {
        term.push_str(&format!(r#" AND ("{}"[Affiliation])"#, affiliation));
    }
    Ok(term)
}

/// Build the identifier search term for an ORCID.
pub fn orcid_search_term(orcid: &str, start: &str, end: &str) -> Result<String> {
    let (start, end) = term_date_range(start, end)?;
    Ok(format!(
        r#"("{}"[Identifier]) AND ("{}"[Date - Publication] : {}[Date - Publication])"#,
        orcid, start, end
    ))
}

/// Convert the identity window into term dates. A blank end becomes the
/// open-ended sentinel; a blank or malformed start, or a malformed end, is
/// a format error.
fn term_date_range(start: &str, end: &str) -> Result<(String, String)> {
    let start = parse_input_date(start)?.format(TERM_DATE_FORMAT).to_string();
    let end = if end.trim().is_empty() {
        OPEN_END_SENTINEL.to_string()
    } else {
        parse_input_date(end)?.format(TERM_DATE_FORMAT).to_string()
    };
    Ok((start, end))
}

/// Parse an identity-table date (`MM/DD/YY`).
pub fn parse_input_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), INPUT_DATE_FORMAT).map_err(|e| {
        PubmedError::Format(format!("'{}' is not a MM/DD/YY date: {}", value, e))
    })
}
