//! NCBI E-utilities client.
//!
//! Three endpoints are used:
//! - `esearch`: term -> hit count and PMID list (JSON)
//! - `epost`: PMID list -> history session (`WebEnv` + `query_key`, XML)
//! - `efetch`: history session + offset/limit -> raw PubMed XML
//!
//! [`EntrezApi`] is the seam the search and batch components are written
//! against; [`EntrezClient`] is the reqwest implementation.

use crate::config::ClientConfig;
use crate::error::{OptionExt, PubmedError, Result};
use crate::xml::Element;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

/// PubMed database name
const DB: &str = "pubmed";

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Total hit count reported by the service
    pub count: usize,
    /// Identifiers returned (capped by `retmax`)
    pub ids: Vec<String>,
}

/// Server-side history session representing a submitted identifier set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySession {
    pub web_env: String,
    pub query_key: String,
}

/// Remote literature service operations
#[async_trait]
pub trait EntrezApi: Send + Sync {
    /// Search one term, returning up to `max_results` identifiers.
    async fn search(&self, term: &str, max_results: usize) -> Result<SearchPage>;

    /// Submit an identifier set, returning the session that represents it.
    async fn post_ids(&self, ids: &[String]) -> Result<HistorySession>;

    /// Fetch raw record text for `[offset, offset + limit)` of a submitted set.
    async fn fetch_page(&self, session: &HistorySession, offset: usize, limit: usize) -> Result<String>;
}

/// reqwest-backed E-utilities client
pub struct EntrezClient {
    client: Client,
    config: ClientConfig,
}

impl EntrezClient {
    /// Create a new client from an explicit configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("{}/1.0 (mailto:{})", config.tool, config.email))
            .timeout(config.timeout)
            .build()
            .map_err(|e| PubmedError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}.fcgi", self.config.base_url.trim_end_matches('/'), name)
    }

    /// Parameters sent with every request
    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", DB.to_string()),
            ("tool", self.config.tool.clone()),
            ("email", self.config.email.clone()),
        ];
        if let Some(key) = &self.config.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }
}

/// Map a non-success status to an error, reading the body for the message.
async fn check_status(response: Response, endpoint: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(PubmedError::RateLimited(1));
    }

    let body = response.text().await.unwrap_or_default();
    Err(PubmedError::Upstream {
        status: status.as_u16(),
        message: format!("{} returned {}: {}", endpoint, status, body.trim()),
    })
}

#[async_trait]
impl EntrezApi for EntrezClient {
    async fn search(&self, term: &str, max_results: usize) -> Result<SearchPage> {
        let mut params = self.common_params();
        params.push(("term", term.to_string()));
        params.push(("retmax", max_results.to_string()));
        params.push(("usehistory", "y".to_string()));
        params.push(("retmode", "json".to_string()));

        debug!(term = term, "esearch");
        let response = self
            .client
            .post(self.endpoint("esearch"))
            .form(&params)
            .send()
            .await?;
        let body = check_status(response, "esearch").await?.text().await?;
        parse_search_response(&body)
    }

    async fn post_ids(&self, ids: &[String]) -> Result<HistorySession> {
        let mut params = self.common_params();
        params.push(("id", ids.join(",")));

        debug!(count = ids.len(), "epost");
        let response = self
            .client
            .post(self.endpoint("epost"))
            .form(&params)
            .send()
            .await?;
        let body = check_status(response, "epost").await?.text().await?;
        parse_post_response(&body)
    }

    async fn fetch_page(&self, session: &HistorySession, offset: usize, limit: usize) -> Result<String> {
        let mut params = self.common_params();
        params.push(("WebEnv", session.web_env.clone()));
        params.push(("query_key", session.query_key.clone()));
        params.push(("retstart", offset.to_string()));
        params.push(("retmax", limit.to_string()));
        params.push(("retmode", "xml".to_string()));

        debug!(offset = offset, limit = limit, "efetch");
        let response = self
            .client
            .post(self.endpoint("efetch"))
            .form(&params)
            .send()
            .await?;
        Ok(check_status(response, "efetch").await?.text().await?)
    }
}

// === E-utilities Response Types ===

#[derive(Debug, Deserialize)]
struct EsearchEnvelope {
    esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    count: Option<String>,
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR", default)]
    error: Option<String>,
}

/// Parse an esearch JSON body.
fn parse_search_response(body: &str) -> Result<SearchPage> {
    let envelope: EsearchEnvelope = serde_json::from_str(body)
        .map_err(|e| PubmedError::Parse(format!("Failed to parse esearch response: {}", e)))?;
    let result = envelope.esearchresult;

    if let Some(error) = result.error {
        return Err(PubmedError::Upstream {
            status: 200,
            message: format!("esearch error: {}", error),
        });
    }

    let count = result
        .count
        .as_deref()
        .unwrap_or("0")
        .parse()
        .map_err(|_| PubmedError::Parse("esearch count is not a number".to_string()))?;

    Ok(SearchPage {
        count,
        ids: result.idlist,
    })
}

/// Parse an epost XML body into a history session.
fn parse_post_response(body: &str) -> Result<HistorySession> {
    let doc = Element::parse(body)?;
    let result = doc.descendant("ePostResult").ok_or_parse("epost response has no ePostResult")?;

    if let Some(error) = result.child("ERROR") {
        return Err(PubmedError::Upstream {
            status: 200,
            message: format!("epost error: {}", error.text()),
        });
    }

    let web_env = result.child("WebEnv").map(Element::text).unwrap_or_default();
    let query_key = result.child("QueryKey").map(Element::text).unwrap_or_default();
    if web_env.is_empty() || query_key.is_empty() {
        return Err(PubmedError::Parse(
            "epost response is missing WebEnv or QueryKey".to_string(),
        ));
    }

    Ok(HistorySession { web_env, query_key })
}
