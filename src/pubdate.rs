//! Publication date normalization.
//!
//! PubMed journal issue dates come in two shapes:
//! - structured: optional `Year`, `Month`, `Day` sub-elements, where `Month`
//!   may be numeric, an abbreviation, a season, or a range (`Jan-Feb`);
//! - free text: a single `MedlineDate` span such as `2019 Jan-Feb`,
//!   `1998 Dec-1999 Jan` or `2021 Summer`.
//!
//! Both normalize to an ISO `YYYY-MM-DD` string. Missing parts take the
//! sentinel values below; a month or day token that cannot be resolved fails.

use crate::record::Field;
use crate::xml::Element;
use chrono::{Month, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

/// Year used when no four-digit year can be found
pub const UNKNOWN_YEAR: i32 = 2099;

/// Month and day used when absent
const FIRST: u32 = 1;

/// Season that maps to a month
const SUMMER: (&str, u32) = ("Summer", 6);

/// First run of exactly four digits
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])([0-9]{4})(?:[^0-9]|$)").expect("valid regex"));

/// Source shape of a journal issue date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubDate {
    /// Separate year/month/day sub-elements, each optional
    Structured {
        year: Option<String>,
        month: Option<String>,
        day: Option<String>,
    },
    /// Approximate free-text date
    FreeText(String),
}

impl Default for PubDate {
    fn default() -> Self {
        PubDate::Structured {
            year: None,
            month: None,
            day: None,
        }
    }
}

impl PubDate {
    /// Read a `PubDate` element. `MedlineDate` wins over structured parts.
    pub fn from_element(element: Option<&Element>) -> Self {
        let Some(element) = element else {
            return PubDate::default();
        };
        if let Some(medline) = element.child("MedlineDate") {
            return PubDate::FreeText(medline.text());
        }
        let part = |name: &str| {
            element
                .child(name)
                .map(Element::text)
                .filter(|t| !t.is_empty())
        };
        PubDate::Structured {
            year: part("Year"),
            month: part("Month"),
            day: part("Day"),
        }
    }

    /// Normalize to `YYYY-MM-DD`.
    pub fn normalize(&self) -> Field<String> {
        let mut defaulted = Vec::new();

        let (year_text, month_token, day_text) = match self {
            PubDate::Structured { year, month, day } => (
                year.as_deref(),
                month.as_deref().map(token_before_range),
                day.as_deref(),
            ),
            PubDate::FreeText(text) => (Some(text.as_str()), free_text_month(text), None),
        };

        let year = match year_text.and_then(first_year) {
            Some(y) => y,
            None => {
                defaulted.push("year");
                UNKNOWN_YEAR
            }
        };

        let month = match month_token {
            None => {
                defaulted.push("month");
                FIRST
            }
            Some(token) => match resolve_month(token) {
                Some(m) => m,
                None => return Field::Failed(format!("unrecognized month token '{}'", token)),
            },
        };

        let day = match day_text {
            None => {
                defaulted.push("day");
                FIRST
            }
            Some(text) => match text.trim().parse::<u32>() {
                Ok(d) => d,
                Err(_) => return Field::Failed(format!("unrecognized day '{}'", text)),
            },
        };

        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            return Field::Failed(format!(
                "{:04}-{:02}-{:02} is not a calendar date",
                year, month, day
            ));
        };
        let value = date.format("%Y-%m-%d").to_string();

        if defaulted.is_empty() {
            Field::Value(value)
        } else {
            Field::Defaulted {
                value,
                reason: format!("missing {}", defaulted.join(", ")),
            }
        }
    }
}

/// First run of exactly four digits in `text`
fn first_year(text: &str) -> Option<i32> {
    YEAR.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Part of a month value before any `-` or `/` range separator
fn token_before_range(month: &str) -> &str {
    month.split(['-', '/']).next().unwrap_or(month).trim()
}

/// Month token of a free-text date: the first word before any range
/// separator that is not the four-digit year. `2019 Jan-Feb` gives `Jan`,
/// `2019 3-4` gives `3`, `2019-2020` has no month.
fn free_text_month(text: &str) -> Option<&str> {
    token_before_range(text)
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .find(|word| !word.is_empty() && !is_year_token(word))
}

fn is_year_token(word: &str) -> bool {
    word.len() == 4 && word.chars().all(|c| c.is_ascii_digit())
}

/// Resolve a month token to its number: `Summer`, a month name or
/// abbreviation, or a numeric month.
fn resolve_month(token: &str) -> Option<u32> {
    let token = token.trim();
    if token == SUMMER.0 {
        return Some(SUMMER.1);
    }
    if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
        return token.parse().ok();
    }
    token.parse::<Month>().ok().map(|m| m.number_from_month())
}
