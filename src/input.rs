//! Identity table loading and validation.
//!
//! The identity table is a CSV with the columns `lname`, `fname`, `mname`,
//! `affiliation`, `start`, `end` and `orcid`. Blank optional cells load as
//! `None`.

use crate::error::{PubmedError, Result};
use crate::terms::{parse_input_date, Identity};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{info, warn};

/// `dddd-dddd-dddd-dddd`, last character may be `X`
static ORCID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{3}[0-9X]$").expect("valid regex"));

/// Load identities from a CSV file.
pub fn load_identities(path: &Path) -> Result<Vec<Identity>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let identities = reader
        .deserialize()
        .collect::<std::result::Result<Vec<Identity>, _>>()?;

    info!(path = %path.display(), count = identities.len(), "Loaded identities");
    Ok(identities)
}

/// Whether `orcid` has the `dddd-dddd-dddd-dddd` shape.
pub fn is_valid_orcid(orcid: &str) -> bool {
    ORCID.is_match(orcid)
}

/// Check every identity row.
///
/// An ORCID with the wrong shape is removed and the row keeps its name-based
/// searches. A missing or malformed start date, or a malformed end date, is
/// a validation error naming the row. Returns the checked rows and the
/// warnings that were logged.
pub fn validate_identities(identities: Vec<Identity>) -> Result<(Vec<Identity>, Vec<String>)> {
    let mut warnings = Vec::new();
    let mut checked = Vec::with_capacity(identities.len());

    for (i, mut identity) in identities.into_iter().enumerate() {
        let row = i + 1;

        if let Some(orcid) = identity.orcid.as_deref() {
            if !is_valid_orcid(orcid) {
                let msg = format!(
                    "Row {} ({}): ORCID '{}' is not dddd-dddd-dddd-dddd; removed",
                    row,
                    identity.display_name(),
                    orcid
                );
                warn!("{}", msg);
                warnings.push(msg);
                identity.orcid = None;
            }
        }

        parse_input_date(&identity.start).map_err(|e| {
            PubmedError::Validation(format!(
                "Row {} ({}): bad start date: {}",
                row,
                identity.display_name(),
                e
            ))
        })?;

        if let Some(end) = identity.end.as_deref() {
            parse_input_date(end).map_err(|e| {
                PubmedError::Validation(format!(
                    "Row {} ({}): bad end date: {}",
                    row,
                    identity.display_name(),
                    e
                ))
            })?;
        }

        checked.push(identity);
    }

    Ok((checked, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> Result<NamedTempFile> {
        let mut temp = NamedTempFile::new()?;
        temp.write_all(content.as_bytes())?;
        Ok(temp)
    }

    #[test]
    fn test_load_identities_blank_cells() -> Result<()> {
        let temp = write_csv(
            "lname,fname,mname,affiliation,start,end,orcid\n\
             Doe,John,Q,Mayo Clinic,01/01/20,,0000-0002-1825-0097\n\
             Smith-Jones, Mary ,,,07/15/18,12/31/21,\n",
        )?;

        let identities = load_identities(temp.path())?;
        assert_eq!(identities.len(), 2);

        assert_eq!(identities[0].middle_name.as_deref(), Some("Q"));
        assert_eq!(identities[0].end, None);
        assert_eq!(identities[0].orcid.as_deref(), Some("0000-0002-1825-0097"));

        assert_eq!(identities[1].first_name, "Mary");
        assert_eq!(identities[1].middle_name, None);
        assert_eq!(identities[1].affiliation, None);
        assert_eq!(identities[1].end.as_deref(), Some("12/31/21"));
        Ok(())
    }

    #[test]
    fn test_load_identities_optional_columns_absent() -> Result<()> {
        let temp = write_csv("lname,fname,start\nLee,Ann,03/04/19\n")?;
        let identities = load_identities(temp.path())?;
        assert_eq!(identities[0].last_name, "Lee");
        assert!(identities[0].orcid.is_none());
        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_identities(Path::new("/nonexistent/identities.csv")).is_err());
    }

    #[test]
    fn test_orcid_shape() {
        assert!(is_valid_orcid("0000-0002-1825-0097"));
        assert!(is_valid_orcid("0000-0002-1694-233X"));
        assert!(!is_valid_orcid("0000-0002-1825-009"));
        assert!(!is_valid_orcid("0000000218250097"));
        assert!(!is_valid_orcid("https://orcid.org/0000-0002-1825-0097"));
    }

    fn identity(start: &str, end: Option<&str>, orcid: Option<&str>) -> Identity {
        Identity {
            last_name: "Doe".to_string(),
            first_name: "John".to_string(),
            middle_name: None,
            affiliation: None,
            start: start.to_string(),
            end: end.map(str::to_string),
            orcid: orcid.map(str::to_string),
        }
    }

    #[test]
    fn test_validate_removes_bad_orcid() -> Result<()> {
        let rows = vec![
            identity("01/01/20", None, Some("0000-0002-1825-0097")),
            identity("01/01/20", None, Some("12345")),
        ];
        let (rows, warnings) = validate_identities(rows)?;
        assert!(rows[0].orcid.is_some());
        assert!(rows[1].orcid.is_none());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Row 2"));
        Ok(())
    }

    #[test]
    fn test_validate_rejects_bad_dates() {
        let err = validate_identities(vec![identity("2020-01-01", None, None)])
            .expect_err("bad start");
        assert!(matches!(err, PubmedError::Validation(ref m) if m.starts_with("Row 1")));

        let err = validate_identities(vec![
            identity("01/01/20", None, None),
            identity("01/01/20", Some("31/12/21"), None),
        ])
        .expect_err("bad end");
        assert!(matches!(err, PubmedError::Validation(ref m) if m.contains("Row 2")));
    }
}
