//! PubMed record parsing.
//!
//! Turns one `<PubmedArticle>` blob into a [`PublicationRecord`]. Every
//! field is read from an explicit path inside its own block, so reference
//! lists, comment corrections and investigator lists never leak into the
//! article's fields.
//!
//! Each field is first extracted as a [`Field`]; a single [`ParsePolicy`]
//! then decides what a failed field means for the record.

use crate::error::{PubmedError, Result};
use crate::grants::GrantVariants;
use crate::pubdate::PubDate;
use crate::xml::Element;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::{debug, debug_span, warn};

/// Placeholder for missing author names and journal titles
pub const UNKNOWN: &str = "Unknown";

/// Placeholder for a publication date that could not be resolved
pub const UNKNOWN_DATE: &str = "unknown";

/// Delimiter used when flattening list fields
pub const LIST_DELIMITER: &str = "; ";

/// Trial registry accession, e.g. `NCT01234567`
static NCT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"NCT[0-9]").expect("valid regex"));

/// Extraction result for one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    /// Present in the record
    Value(T),
    /// Absent or partial; replaced by a documented default
    Defaulted { value: T, reason: String },
    /// Present but unreadable
    Failed(String),
}

impl<T> Field<T> {
    /// Field that falls back to `default` when `value` is absent.
    pub fn or_default(value: Option<T>, default: T, reason: &str) -> Self {
        match value {
            Some(v) => Field::Value(v),
            None => Field::Defaulted {
                value: default,
                reason: reason.to_string(),
            },
        }
    }
}

/// What a failed field means for the record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParsePolicy {
    /// Failed fields are format errors
    #[default]
    Strict,
    /// Failed fields settle to their sentinel
    Lenient,
}

impl ParsePolicy {
    /// Turn a field into its final value. Defaulted fields are logged with
    /// their reason.
    pub fn settle<T>(self, name: &str, field: Field<T>, sentinel: impl FnOnce() -> T) -> Result<T> {
        match field {
            Field::Value(v) => Ok(v),
            Field::Defaulted { value, reason } => {
                debug!(field = name, reason = %reason, "Field defaulted");
                Ok(value)
            }
            Field::Failed(reason) => match self {
                ParsePolicy::Strict => Err(PubmedError::Format(format!("{}: {}", name, reason))),
                ParsePolicy::Lenient => Ok(sentinel()),
            },
        }
    }
}

/// One author block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorEntry {
    pub last_name: String,
    pub initials: String,
    pub fore_name: String,
    pub affiliation: String,
}

impl AuthorEntry {
    fn from_element(author: &Element) -> Self {
        let name_part = |name: &str| {
            author
                .child(name)
                .map(Element::text)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string())
        };
        let affiliation = author
            .path(&["AffiliationInfo", "Affiliation"])
            .or_else(|| author.child("Affiliation"))
            .map(Element::text)
            .unwrap_or_default();

        Self {
            last_name: name_part("LastName"),
            initials: name_part("Initials"),
            fore_name: name_part("ForeName"),
            affiliation,
        }
    }

    /// `ForeName LastName`
    pub fn full_name(&self) -> String {
        format!("{} {}", self.fore_name, self.last_name)
    }
}

/// Normalized publication record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationRecord {
    /// PubMed id
    pub pmid: String,
    /// PubMed Central id without the `PMC` prefix, or empty
    pub pmcid: String,
    /// NIH manuscript id without the `NIHMS` prefix, or empty
    pub nihmsid: String,
    /// Trial registry ids
    pub nct_ids: Vec<String>,
    pub title: String,
    /// Authors in record order
    pub authors: Vec<AuthorEntry>,
    /// `YYYY-MM-DD`, or `unknown` under the lenient policy
    pub pub_date: String,
    pub journal_short: String,
    pub journal_full: String,
    /// Matched grant ids in appearance order, duplicates kept
    pub grant_tags: Vec<String>,
    /// Name variations / ORCIDs whose searches returned this record
    pub provenance: Vec<String>,
}

/// Flattened output row
#[derive(Debug, Clone, Serialize)]
pub struct PublicationRow {
    pub pmid: String,
    pub pmcid: String,
    pub nihmsid: String,
    pub nctid: String,
    pub pub_title: String,
    pub authors: String,
    pub authors_lnames: String,
    pub authors_initials: String,
    pub authors_affil: String,
    pub pub_date: String,
    pub journal_short: String,
    pub journal_full: String,
    pub pubmed_tags: String,
    pub name_variations: String,
}

fn join_authors(authors: &[AuthorEntry], part: impl Fn(&AuthorEntry) -> String) -> String {
    authors.iter().map(part).collect::<Vec<_>>().join(LIST_DELIMITER)
}

impl PublicationRecord {
    /// Flatten list fields into delimited strings.
    pub fn to_row(&self) -> PublicationRow {
        PublicationRow {
            pmid: self.pmid.clone(),
            pmcid: self.pmcid.clone(),
            nihmsid: self.nihmsid.clone(),
            nctid: self.nct_ids.join(LIST_DELIMITER),
            pub_title: self.title.clone(),
            authors: join_authors(&self.authors, AuthorEntry::full_name),
            authors_lnames: join_authors(&self.authors, |a| a.last_name.clone()),
            authors_initials: join_authors(&self.authors, |a| a.initials.clone()),
            authors_affil: join_authors(&self.authors, |a| a.affiliation.clone()),
            pub_date: self.pub_date.clone(),
            journal_short: self.journal_short.clone(),
            journal_full: self.journal_full.clone(),
            pubmed_tags: self.grant_tags.join(LIST_DELIMITER),
            name_variations: self.provenance.join(LIST_DELIMITER),
        }
    }
}

/// Parse one raw record blob.
///
/// A missing PMID always fails. A date that cannot be resolved fails under
/// [`ParsePolicy::Strict`] and becomes [`UNKNOWN_DATE`] under
/// [`ParsePolicy::Lenient`]. Every other absent section is defaulted.
pub fn parse_record(raw: &str, grants: &GrantVariants, policy: ParsePolicy) -> Result<PublicationRecord> {
    let doc = Element::parse(raw)?;
    let record = doc.descendant("PubmedArticle").unwrap_or(&doc);

    let citation = record.child("MedlineCitation");
    let pmid = citation
        .and_then(|c| c.child("PMID"))
        .map(Element::text)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PubmedError::Parse("record has no PMID".to_string()))?;

    let _span = debug_span!("record", pmid = %pmid).entered();

    let article = citation.and_then(|c| c.child("Article"));
    let journal = article.and_then(|a| a.child("Journal"));
    let article_ids = record.path(&["PubmedData", "ArticleIdList"]);

    let pmcid = policy.settle(
        "pmcid",
        Field::or_default(prefixed_article_id(article_ids, "pmc", "PMC"), String::new(), "no pmc article id"),
        String::new,
    )?;
    let nihmsid = policy.settle(
        "nihmsid",
        Field::or_default(prefixed_article_id(article_ids, "mid", "NIHMS"), String::new(), "no mid article id"),
        String::new,
    )?;

    let nct_ids = article.and_then(|a| a.child("DataBankList")).map(|list| {
        list.descendants("AccessionNumber")
            .into_iter()
            .filter_map(|acc| {
                let text = acc.text();
                NCT_ID.find(&text).map(|m| text[m.start()..].to_string())
            })
            .collect::<Vec<String>>()
    });
    let nct_ids = policy.settle(
        "nct_ids",
        Field::or_default(nct_ids, Vec::new(), "no DataBankList"),
        Vec::new,
    )?;

    let title = article
        .and_then(|a| a.child("ArticleTitle"))
        .map(Element::text);
    let title = policy.settle(
        "title",
        Field::or_default(title, String::new(), "no ArticleTitle"),
        String::new,
    )?;

    let authors = article
        .and_then(|a| a.child("AuthorList"))
        .map(|list| list.children_named("Author").map(AuthorEntry::from_element).collect::<Vec<_>>());
    let authors = policy.settle(
        "authors",
        Field::or_default(authors, Vec::new(), "no AuthorList"),
        Vec::new,
    )?;

    let date_field = PubDate::from_element(journal.and_then(|j| j.path(&["JournalIssue", "PubDate"]))).normalize();
    if let Field::Failed(reason) = &date_field {
        warn!(pmid = %pmid, reason = %reason, "Unresolvable publication date");
    }
    let pub_date = policy.settle(&format!("PMID {} pub_date", pmid), date_field, || {
        UNKNOWN_DATE.to_string()
    })?;

    let journal_text = |name: &str| {
        Field::or_default(
            journal
                .and_then(|j| j.child(name))
                .map(Element::text)
                .filter(|t| !t.is_empty()),
            UNKNOWN.to_string(),
            "journal section absent",
        )
    };
    let journal_short = policy.settle("journal_short", journal_text("ISOAbbreviation"), || UNKNOWN.to_string())?;
    let journal_full = policy.settle("journal_full", journal_text("Title"), || UNKNOWN.to_string())?;

    let grant_ids: Vec<String> = article
        .and_then(|a| a.child("GrantList"))
        .map(|list| {
            list.children_named("Grant")
                .filter_map(|g| g.child("GrantID"))
                .map(Element::raw_text)
                .collect()
        })
        .unwrap_or_default();
    let grant_tags = grants.matching(grant_ids.iter().map(String::as_str));

    Ok(PublicationRecord {
        pmid,
        pmcid,
        nihmsid,
        nct_ids,
        title,
        authors,
        pub_date,
        journal_short,
        journal_full,
        grant_tags,
        provenance: Vec::new(),
    })
}

/// `ArticleId` of the given `IdType`, with its prefix removed.
fn prefixed_article_id(list: Option<&Element>, id_type: &str, prefix: &str) -> Option<String> {
    list.into_iter()
        .flat_map(|l| l.children_named("ArticleId"))
        .filter(|id| id.attr("IdType") == Some(id_type))
        .map(Element::text)
        .find_map(|text| text.strip_prefix(prefix).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_RECORD: &str = r#"<PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
        <PMID Version="1">31234567</PMID>
        <Article PubModel="Print-Electronic">
            <Journal>
                <ISSN IssnType="Electronic">1538-7445</ISSN>
                <JournalIssue CitedMedium="Internet">
                    <Volume>79</Volume>
                    <Issue>12</Issue>
                    <PubDate>
                        <Year>2019</Year>
                        <Month>Jun</Month>
                        <Day>15</Day>
                    </PubDate>
                </JournalIssue>
                <Title>Cancer research</Title>
                <ISOAbbreviation>Cancer Res</ISOAbbreviation>
            </Journal>
            <ArticleTitle>Targeting <i>KRAS</i> in pancreatic cancer.</ArticleTitle>
            <AuthorList CompleteYN="Y">
                <Author ValidYN="Y">
                    <LastName>Smith-Jones</LastName>
                    <ForeName>Mary</ForeName>
                    <Initials>M</Initials>
                    <AffiliationInfo>
                        <Affiliation>Mayo Clinic, Rochester, MN, USA.</Affiliation>
                    </AffiliationInfo>
                </Author>
                <Author ValidYN="Y">
                    <LastName>Doe</LastName>
                    <ForeName>John Q</ForeName>
                    <Initials>JQ</Initials>
                </Author>
            </AuthorList>
            <DataBankList CompleteYN="Y">
                <DataBank>
                    <DataBankName>ClinicalTrials.gov</DataBankName>
                    <AccessionNumberList>
                        <AccessionNumber>NCT01234567</AccessionNumber>
                        <AccessionNumber>NCT07654321</AccessionNumber>
                    </AccessionNumberList>
                </DataBank>
            </DataBankList>
            <GrantList CompleteYN="Y">
                <Grant>
                    <GrantID>R01CA123456</GrantID>
                    <Acronym>CA</Acronym>
                    <Agency>NCI NIH HHS</Agency>
                </Grant>
                <Grant>
                    <GrantID>R01 CA123456</GrantID>
                </Grant>
                <Grant>
                    <Agency>Internal</Agency>
                </Grant>
                <Grant>
                    <GrantID>R01CA123456</GrantID>
                </Grant>
            </GrantList>
        </Article>
        <CommentsCorrectionsList>
            <CommentsCorrections RefType="CommentIn">
                <PMID Version="1">39999999</PMID>
            </CommentsCorrections>
        </CommentsCorrectionsList>
    </MedlineCitation>
    <PubmedData>
        <ArticleIdList>
            <ArticleId IdType="pubmed">31234567</ArticleId>
            <ArticleId IdType="pmc">PMC6543210</ArticleId>
            <ArticleId IdType="mid">NIHMS1530000</ArticleId>
        </ArticleIdList>
        <ReferenceList>
            <Reference>
                <ArticleIdList>
                    <ArticleId IdType="pmc">PMC1111111</ArticleId>
                </ArticleIdList>
            </Reference>
        </ReferenceList>
    </PubmedData>
</PubmedArticle>"#;

    const MINIMAL_RECORD: &str = r#"<PubmedArticle>
    <MedlineCitation>
        <PMID>20000001</PMID>
        <Article>
            <Journal>
                <JournalIssue>
                    <PubDate><Year>2015</Year></PubDate>
                </JournalIssue>
            </Journal>
            <AuthorList>
                <Author ValidYN="Y">
                    <CollectiveName>Study Group</CollectiveName>
                </Author>
            </AuthorList>
        </Article>
    </MedlineCitation>
</PubmedArticle>"#;

    fn grants() -> GrantVariants {
        GrantVariants::new(["R01CA123456"])
    }

    #[test]
    fn test_parse_full_record() -> Result<()> {
        let record = parse_record(FULL_RECORD, &grants(), ParsePolicy::Strict)?;

        assert_eq!(record.pmid, "31234567");
        assert_eq!(record.pmcid, "6543210");
        assert_eq!(record.nihmsid, "1530000");
        assert_eq!(record.nct_ids, vec!["NCT01234567", "NCT07654321"]);
        assert_eq!(record.title, "Targeting KRAS in pancreatic cancer.");
        assert_eq!(record.pub_date, "2019-06-15");
        assert_eq!(record.journal_short, "Cancer Res");
        assert_eq!(record.journal_full, "Cancer research");
        assert_eq!(record.grant_tags, vec!["R01CA123456", "R01CA123456"]);

        assert_eq!(record.authors.len(), 2);
        assert_eq!(record.authors[0].full_name(), "Mary Smith-Jones");
        assert_eq!(record.authors[0].affiliation, "Mayo Clinic, Rochester, MN, USA.");
        assert_eq!(record.authors[1].initials, "JQ");
        assert_eq!(record.authors[1].affiliation, "");

        let row = record.to_row();
        assert_eq!(row.authors, "Mary Smith-Jones; John Q Doe");
        assert_eq!(row.authors_lnames, "Smith-Jones; Doe");
        assert_eq!(row.authors_initials, "M; JQ");
        assert_eq!(row.authors_affil, "Mayo Clinic, Rochester, MN, USA.; ");
        assert_eq!(row.nctid, "NCT01234567; NCT07654321");
        assert_eq!(row.pubmed_tags, "R01CA123456; R01CA123456");
        Ok(())
    }

    #[test]
    fn test_parse_minimal_record_defaults() -> Result<()> {
        let record = parse_record(MINIMAL_RECORD, &grants(), ParsePolicy::Strict)?;

        assert_eq!(record.pmid, "20000001");
        assert_eq!(record.pmcid, "");
        assert_eq!(record.nihmsid, "");
        assert!(record.nct_ids.is_empty());
        assert_eq!(record.title, "");
        assert_eq!(record.pub_date, "2015-01-01");
        assert_eq!(record.journal_short, UNKNOWN);
        assert_eq!(record.journal_full, UNKNOWN);
        assert!(record.grant_tags.is_empty());

        let author = &record.authors[0];
        assert_eq!(author.last_name, UNKNOWN);
        assert_eq!(author.initials, UNKNOWN);
        assert_eq!(author.fore_name, UNKNOWN);
        assert_eq!(author.affiliation, "");
        Ok(())
    }

    #[test]
    fn test_missing_pmid_fails_under_any_policy() {
        let raw = "<PubmedArticle><MedlineCitation><Article/></MedlineCitation></PubmedArticle>";
        assert!(matches!(
            parse_record(raw, &grants(), ParsePolicy::Strict),
            Err(PubmedError::Parse(_))
        ));
        assert!(matches!(
            parse_record(raw, &grants(), ParsePolicy::Lenient),
            Err(PubmedError::Parse(_))
        ));
    }

    #[test]
    fn test_bad_date_strict_vs_lenient() -> Result<()> {
        let raw = r#"<PubmedArticle><MedlineCitation><PMID>1</PMID><Article><Journal>
            <JournalIssue><PubDate><MedlineDate>2000 Fall-Winter</MedlineDate></PubDate></JournalIssue>
            </Journal></Article></MedlineCitation></PubmedArticle>"#;

        assert!(matches!(
            parse_record(raw, &grants(), ParsePolicy::Strict),
            Err(PubmedError::Format(_))
        ));

        let record = parse_record(raw, &grants(), ParsePolicy::Lenient)?;
        assert_eq!(record.pub_date, UNKNOWN_DATE);
        Ok(())
    }

    #[test]
    fn test_missing_pubdate_uses_sentinel_year() -> Result<()> {
        let raw = "<PubmedArticle><MedlineCitation><PMID>2</PMID></MedlineCitation></PubmedArticle>";
        let record = parse_record(raw, &grants(), ParsePolicy::Strict)?;
        assert_eq!(record.pub_date, "2099-01-01");
        Ok(())
    }

    #[test]
    fn test_field_policy() {
        let failed: Field<String> = Field::Failed("bad".to_string());
        assert!(ParsePolicy::Strict
            .settle("f", failed.clone(), || "x".to_string())
            .is_err());
        assert_eq!(
            ParsePolicy::Lenient.settle("f", failed, || "x".to_string()).ok(),
            Some("x".to_string())
        );

        let defaulted = Field::or_default(None, 1, "absent");
        assert_eq!(
            defaulted,
            Field::Defaulted {
                value: 1,
                reason: "absent".to_string()
            }
        );
        assert_eq!(ParsePolicy::Strict.settle("f", defaulted.clone(), || 0).ok(), Some(1));
        assert_eq!(ParsePolicy::Lenient.settle("f", defaulted, || 0).ok(), Some(1));
        assert_eq!(ParsePolicy::Strict.settle("f", Field::Value(7), || 0).ok(), Some(7));
    }

    #[test]
    fn test_absent_article_defaults_under_both_policies() -> Result<()> {
        let raw = "<PubmedArticle><MedlineCitation><PMID>5</PMID></MedlineCitation></PubmedArticle>";
        for policy in [ParsePolicy::Strict, ParsePolicy::Lenient] {
            let record = parse_record(raw, &grants(), policy)?;
            assert_eq!(record.title, "");
            assert!(record.authors.is_empty());
            assert!(record.nct_ids.is_empty());
            assert_eq!((record.pmcid.as_str(), record.nihmsid.as_str()), ("", ""));
            assert_eq!(record.journal_full, UNKNOWN);
        }
        Ok(())
    }
}
