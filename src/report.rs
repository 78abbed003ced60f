//! CSV reports for one pipeline run.
//!
//! Reports are written into a staging directory next to the run folder,
//! which is renamed into place once every report is complete. A failed
//! write leaves no run folder behind.

use crate::error::Result;
use crate::pipeline::{PipelineOutput, TermResolution};
use crate::provenance::QueryOrigin;
use crate::record::{PublicationRow, LIST_DELIMITER};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Longest cell written to the details report, in characters
pub const MAX_CELL_CHARS: usize = 30_000;

pub const DETAILS_FILE: &str = "pmid_details.csv";
pub const NAMES_FILE: &str = "names_results.csv";
pub const ORCID_FILE: &str = "orcid_results.csv";

/// Row type with a fixed column order. Headers are written from this list
/// so a table with no rows still has its header line.
trait ReportRow: Serialize {
    const HEADERS: &'static [&'static str];
}

impl ReportRow for PublicationRow {
    const HEADERS: &'static [&'static str] = &[
        "pmid",
        "pmcid",
        "nihmsid",
        "nctid",
        "pub_title",
        "authors",
        "authors_lnames",
        "authors_initials",
        "authors_affil",
        "pub_date",
        "journal_short",
        "journal_full",
        "pubmed_tags",
        "name_variations",
    ];
}

/// Per-variation search result
#[derive(Debug, Clone, Serialize)]
pub struct NameResultRow {
    pub identity: String,
    pub name_variation: String,
    pub term: String,
    pub status: &'static str,
    pub pmids: String,
}

/// Per-ORCID search result
#[derive(Debug, Clone, Serialize)]
pub struct OrcidResultRow {
    pub identity: String,
    pub orcid: String,
    pub term: String,
    pub status: &'static str,
    pub pmids: String,
}

impl ReportRow for NameResultRow {
    const HEADERS: &'static [&'static str] = &["identity", "name_variation", "term", "status", "pmids"];
}

impl ReportRow for OrcidResultRow {
    const HEADERS: &'static [&'static str] = &["identity", "orcid", "term", "status", "pmids"];
}

fn joined_ids(resolution: &TermResolution) -> String {
    resolution
        .ids()
        .into_iter()
        .collect::<Vec<_>>()
        .join(LIST_DELIMITER)
}

/// Truncate to at most `MAX_CELL_CHARS` characters.
fn clip(mut value: String) -> String {
    if let Some((pos, _)) = value.char_indices().nth(MAX_CELL_CHARS) {
        value.truncate(pos);
    }
    value
}

fn clip_row(row: PublicationRow) -> PublicationRow {
    PublicationRow {
        pmid: clip(row.pmid),
        pmcid: clip(row.pmcid),
        nihmsid: clip(row.nihmsid),
        nctid: clip(row.nctid),
        pub_title: clip(row.pub_title),
        authors: clip(row.authors),
        authors_lnames: clip(row.authors_lnames),
        authors_initials: clip(row.authors_initials),
        authors_affil: clip(row.authors_affil),
        pub_date: clip(row.pub_date),
        journal_short: clip(row.journal_short),
        journal_full: clip(row.journal_full),
        pubmed_tags: clip(row.pubmed_tags),
        name_variations: clip(row.name_variations),
    }
}

/// Split resolutions into the name and ORCID result tables.
pub fn result_rows(resolutions: &[TermResolution]) -> (Vec<NameResultRow>, Vec<OrcidResultRow>) {
    let mut names = Vec::new();
    let mut orcids = Vec::new();

    for r in resolutions {
        let identity = r.planned.display_name.clone();
        let term = r.planned.term.clone();
        let status = r.outcome.label();
        let pmids = joined_ids(r);
        match &r.planned.origin {
            QueryOrigin::Name(variation) => names.push(NameResultRow {
                identity,
                name_variation: variation.clone(),
                term,
                status,
                pmids,
            }),
            QueryOrigin::Orcid(orcid) => orcids.push(OrcidResultRow {
                identity,
                orcid: orcid.clone(),
                term,
                status,
                pmids,
            }),
        }
    }

    (names, orcids)
}

/// Output folder for a run started at `now`: `<base>/pubmed_YYYYmmdd_HHMMSS`
pub fn run_folder(base: &Path, now: DateTime<Local>) -> PathBuf {
    base.join(format!("pubmed_{}", now.format("%Y%m%d_%H%M%S")))
}

/// Write a header line then one line per row.
fn write_csv<T: ReportRow>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    wtr.write_record(T::HEADERS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write every report for a run into `dir`.
///
/// `dir` must not exist yet (or be empty); its parent is created if needed.
/// The reports appear together with a single rename, and the ORCID table
/// is only written when at least one ORCID term ran. Returns the written
/// paths.
pub fn write_reports(dir: &Path, output: &PipelineOutput) -> Result<Vec<PathBuf>> {
    let parent = match dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let staging = tempfile::Builder::new().prefix(".staging").tempdir_in(parent)?;

    let details: Vec<PublicationRow> = output
        .records
        .iter()
        .map(|r| clip_row(r.to_row()))
        .collect();
    let (names, orcids) = result_rows(&output.resolutions);

    write_csv(&staging.path().join(DETAILS_FILE), &details)?;
    write_csv(&staging.path().join(NAMES_FILE), &names)?;
    let mut files = vec![DETAILS_FILE, NAMES_FILE];
    if !orcids.is_empty() {
        write_csv(&staging.path().join(ORCID_FILE), &orcids)?;
        files.push(ORCID_FILE);
    }

    std::fs::rename(staging.path(), dir)?;

    let written: Vec<PathBuf> = files.into_iter().map(|f| dir.join(f)).collect();
    for path in &written {
        info!(path = %path.display(), "Saved report");
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PlannedTerm;
    use crate::record::PublicationRecord;
    use crate::search::SearchOutcome;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(pmid: &str, title: String) -> PublicationRecord {
        PublicationRecord {
            pmid: pmid.to_string(),
            pmcid: String::new(),
            nihmsid: String::new(),
            nct_ids: vec![],
            title,
            authors: vec![],
            pub_date: "2020-03-01".to_string(),
            journal_short: "J".to_string(),
            journal_full: "Journal".to_string(),
            grant_tags: vec!["R01CA123456".to_string()],
            provenance: vec!["Doe J".to_string(), "Doe JQ".to_string()],
        }
    }

    fn resolution(origin: QueryOrigin, outcome: SearchOutcome) -> TermResolution {
        TermResolution {
            planned: PlannedTerm {
                identity: 0,
                display_name: "Doe, John".to_string(),
                origin,
                term: "term".to_string(),
            },
            outcome,
        }
    }

    #[test]
    fn test_clip_counts_characters() {
        let long = "é".repeat(MAX_CELL_CHARS + 5);
        assert_eq!(clip(long).chars().count(), MAX_CELL_CHARS);
        assert_eq!(clip("short".to_string()), "short");
    }

    #[test]
    fn test_result_rows_split_by_origin() {
        let hits = SearchOutcome::Hits(["2", "1"].iter().map(|s| s.to_string()).collect());
        let resolutions = vec![
            resolution(QueryOrigin::Orcid("0000-0002-1825-0097".to_string()), SearchOutcome::NoHits),
            resolution(QueryOrigin::Name("Doe J".to_string()), hits),
            resolution(QueryOrigin::Name("Doe Q".to_string()), SearchOutcome::Failed("x".to_string())),
        ];

        let (names, orcids) = result_rows(&resolutions);
        assert_eq!(orcids.len(), 1);
        assert_eq!(orcids[0].status, "no_hits");
        assert_eq!(names[0].pmids, "1; 2");
        assert_eq!(names[1].status, "failed");
        assert_eq!(names[1].pmids, "");
    }

    #[test]
    fn test_run_folder_name() {
        let now = Local
            .with_ymd_and_hms(2024, 5, 6, 7, 8, 9)
            .single()
            .expect("valid local time");
        assert_eq!(
            run_folder(Path::new("out"), now),
            Path::new("out").join("pubmed_20240506_070809")
        );
    }

    #[test]
    fn test_write_reports() -> Result<()> {
        let dir = TempDir::new()?;
        let out = dir.path().join("run");
        let output = PipelineOutput {
            resolutions: vec![resolution(
                QueryOrigin::Name("Doe J".to_string()),
                SearchOutcome::Hits(["1"].iter().map(|s| s.to_string()).collect()),
            )],
            records: vec![record("1", "x".repeat(MAX_CELL_CHARS + 10))],
            skipped: 0,
        };

        let written = write_reports(&out, &output)?;
        assert_eq!(written, vec![out.join(DETAILS_FILE), out.join(NAMES_FILE)]);

        let mut reader = csv::Reader::from_path(out.join(DETAILS_FILE))?;
        let headers = reader.headers()?.clone();
        assert_eq!(headers.get(0), Some("pmid"));
        assert_eq!(headers.get(13), Some("name_variations"));

        let row = reader.records().next().expect("one row")?;
        assert_eq!(row.get(4).map(str::len), Some(MAX_CELL_CHARS));
        assert_eq!(row.get(12), Some("R01CA123456"));
        assert_eq!(row.get(13), Some("Doe J; Doe JQ"));

        // Only the reports are in the folder and no staging dir is left
        assert_eq!(std::fs::read_dir(&out)?.count(), 2);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_empty_output_still_has_headers() -> Result<()> {
        let dir = TempDir::new()?;
        let out = dir.path().join("run");

        let written = write_reports(&out, &PipelineOutput::default())?;
        assert_eq!(written, vec![out.join(DETAILS_FILE), out.join(NAMES_FILE)]);

        let details = std::fs::read_to_string(out.join(DETAILS_FILE))?;
        assert_eq!(details.lines().count(), 1);
        assert!(details.starts_with("pmid,pmcid,nihmsid,nctid,pub_title,"));
        assert!(details.trim_end().ends_with("pubmed_tags,name_variations"));

        let names = std::fs::read_to_string(out.join(NAMES_FILE))?;
        assert_eq!(names.trim_end(), "identity,name_variation,term,status,pmids");
        Ok(())
    }

    #[test]
    fn test_orcid_headers_match_columns() -> Result<()> {
        let dir = TempDir::new()?;
        let out = dir.path().join("run");
        let output = PipelineOutput {
            resolutions: vec![resolution(
                QueryOrigin::Orcid("0000-0002-1825-0097".to_string()),
                SearchOutcome::NoHits,
            )],
            ..PipelineOutput::default()
        };

        write_reports(&out, &output)?;
        let mut reader = csv::Reader::from_path(out.join(ORCID_FILE))?;
        assert_eq!(reader.headers()?.get(1), Some("orcid"));
        let row = reader.records().next().expect("one row")?;
        assert_eq!(row.get(1), Some("0000-0002-1825-0097"));
        assert_eq!(row.get(3), Some("no_hits"));
        Ok(())
    }

    #[test]
    fn test_existing_folder_is_left_untouched() -> Result<()> {
        let dir = TempDir::new()?;
        let out = dir.path().join("run");
        std::fs::create_dir(&out)?;
        std::fs::write(out.join("keep.txt"), "x")?;

        assert!(write_reports(&out, &PipelineOutput::default()).is_err());
        let entries: Vec<_> = std::fs::read_dir(&out)?
            .map(|e| e.map(|e| e.file_name()))
            .collect::<std::io::Result<_>>()?;
        assert_eq!(entries, vec![std::ffi::OsString::from("keep.txt")]);
        // The staging dir is cleaned up
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }
}
