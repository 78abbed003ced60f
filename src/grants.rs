//! Grant tag matching and grant-variant format checks.
//!
//! Matching is exact string equality against the accepted variants: no
//! case folding, no substring or whitespace tolerance.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Letter-letter-digits run, e.g. `CA123456`
static INSTITUTE_SERIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z][0-9]+").expect("valid regex"));

/// Letter-letter-digits at the end of the string
static INSTITUTE_SERIAL_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z][0-9]+$").expect("valid regex"));

/// Activity-code prefix, e.g. `R01`, `UL1`
static ACTIVITY_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[A-Za-z][A-Za-z][0-9]|[A-Za-z][0-9][0-9])$").expect("valid regex"));

/// Outcome of a grant-variant format check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantCheck {
    /// Recognized grant format
    Pass,
    /// Kept, but unlikely to match anything
    Suspicious,
    /// Too short to ever be a grant identifier
    Rejected,
}

/// Check one accepted grant variant against the known grant id shapes.
pub fn check_grant_format(grant: &str) -> GrantCheck {
    let chars: Vec<char> = grant.chars().collect();
    let len = chars.len();
    let tail: String = chars[len.saturating_sub(8)..].iter().collect();

    match len {
        0 => GrantCheck::Pass,
        11 => {
            let head: String = chars[..3].iter().collect();
            if ACTIVITY_CODE.is_match(&head) && INSTITUTE_SERIAL.is_match(&tail) {
                GrantCheck::Pass
            } else {
                GrantCheck::Suspicious
            }
        }
        n if n >= 8 => {
            if INSTITUTE_SERIAL_END.is_match(&tail) {
                GrantCheck::Pass
            } else {
                GrantCheck::Suspicious
            }
        }
        _ => GrantCheck::Rejected,
    }
}

/// Set of accepted grant variants
#[derive(Debug, Clone, Default)]
pub struct GrantVariants {
    accepted: HashSet<String>,
}

impl GrantVariants {
    /// Build from the accepted variants list. Empty entries are ignored.
    pub fn new<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted: variants
                .into_iter()
                .map(Into::into)
                .filter(|v: &String| !v.is_empty())
                .collect(),
        }
    }

    /// Whether `grant_id` exactly equals an accepted variant.
    pub fn accepts(&self, grant_id: &str) -> bool {
        self.accepted.contains(grant_id)
    }

    /// Number of accepted variants
    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    /// True when no variant is accepted
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    /// Keep the raw grant ids that match, in appearance order, duplicates included.
    pub fn matching<'a, I>(&self, grant_ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        grant_ids
            .into_iter()
            .filter(|id| self.accepts(id))
            .map(str::to_string)
            .collect()
    }
}
