//! Client configuration and the settings file.
//!
//! [`ClientConfig`] is passed explicitly to every remote operation; nothing
//! about credentials or sessions lives in module-level state.
//! [`Settings`] is the user-editable JSON file holding the API key, contact
//! email and the accepted grant variants.

use crate::error::{PubmedError, Result};
use crate::grants::{check_grant_format, GrantCheck};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// E-utilities base URL
pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Tool name reported to NCBI
pub const TOOL_NAME: &str = "rustpubmed";

/// Placeholder contact address, replaced by the settings file or `--email`
pub const DEFAULT_EMAIL: &str = "Your.Name.Here@example.org";

/// Maximum identifiers requested per search term
pub const SEARCH_MAX_RESULTS: usize = 5000;

/// Records fetched per batch
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Length of a valid NCBI API key
const API_KEY_LEN: usize = 36;

/// Configuration for the literature service client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// E-utilities base URL (no trailing slash)
    pub base_url: String,
    /// NCBI API key (raises the rate limit)
    pub api_key: Option<String>,
    /// Contact email sent with every request
    pub email: String,
    /// Tool name sent with every request
    pub tool: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Result cap for one search term
    pub search_max_results: usize,
    /// Records per fetch page
    pub batch_size: usize,
    /// Retry policy for term searches
    pub search_retry: RetryPolicy,
    /// Retry policy for bulk submit and fetch
    pub fetch_retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: EUTILS_BASE_URL.to_string(),
            api_key: None,
            email: DEFAULT_EMAIL.to_string(),
            tool: TOOL_NAME.to_string(),
            timeout: Duration::from_secs(120),
            search_max_results: SEARCH_MAX_RESULTS,
            batch_size: DEFAULT_BATCH_SIZE,
            search_retry: RetryPolicy::search(),
            fetch_retry: RetryPolicy::server_errors(),
        }
    }
}

impl ClientConfig {
    /// Build a client configuration from the settings file.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            email: settings
                .email
                .clone()
                .unwrap_or_else(|| DEFAULT_EMAIL.to_string()),
            ..Default::default()
        }
    }
}

/// User settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// NCBI API key
    #[serde(default)]
    pub api_key: Option<String>,
    /// Contact email for NCBI
    #[serde(default)]
    pub email: Option<String>,
    /// Accepted grant variants, matched exactly against record grant ids
    #[serde(default)]
    pub grants: Vec<String>,
}

/// Default settings path: `<config_dir>/rustpubmed/settings.json`
pub fn default_settings_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|p| p.join("rustpubmed").join("settings.json"))
        .ok_or_else(|| PubmedError::Config("Cannot determine config directory".to_string()))
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PubmedError::Config(format!("Cannot read settings {}: {}", path.display(), e))
        })?;
        let settings: Settings = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            grants = settings.grants.len(),
            "Loaded settings"
        );
        Ok(settings)
    }

    /// Check the API key and grant variants.
    ///
    /// A malformed API key is dropped so the run continues unauthenticated.
    /// Grant variants that can never be valid are removed; unusual ones are
    /// kept and reported. Returns the warnings that were logged.
    pub fn validate(mut self) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();

        if let Some(key) = &self.api_key {
            if key.len() != API_KEY_LEN {
                warnings.push(format!(
                    "NCBI API key is not {} characters; continuing without it",
                    API_KEY_LEN
                ));
                self.api_key = None;
            }
        }

        let mut kept = Vec::with_capacity(self.grants.len());
        for grant in self.grants {
            match check_grant_format(&grant) {
                GrantCheck::Pass => kept.push(grant),
                GrantCheck::Suspicious => {
                    warnings.push(format!(
                        "Grant '{}' has an unrecognized format; matches may be unexpected",
                        grant
                    ));
                    kept.push(grant);
                }
                GrantCheck::Rejected => {
                    warnings.push(format!(
                        "Grant '{}' removed: too short to be a grant identifier",
                        grant
                    ));
                }
            }
        }
        self.grants = kept;

        for w in &warnings {
            warn!("{}", w);
        }

        (self, warnings)
    }
}
