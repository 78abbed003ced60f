//! Custom error types for rustpubmed.
//!
//! This module defines all error types used throughout the pipeline.
//! All functions return `Result<T, PubmedError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for rustpubmed operations.
///
/// Errors fall into the classes the pipeline reacts to differently:
/// transient upstream failures are retried, format errors surface
/// immediately, and fetch failures abort the run with enough context to resume.
#[derive(Debug, Error)]
pub enum PubmedError {
    /// Network/HTTP transport error (connect, timeout, body read)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote service answered with a non-success status
    #[error("Upstream error: {status} - {message}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Error message from the service
        message: String,
    },

    /// Rate limited by the remote service
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// A date or identifier could not be read in the expected format
    #[error("Format error: {0}")]
    Format(String),

    /// Record or service payload could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Batch submit/fetch failed after its retry budget
    #[error(
        "Batch {stage} failed at offset {offset} (records {start}-{end}, status {}): {source}",
        display_status(.status)
    )]
    BatchFetch {
        /// `submit` or `fetch`
        stage: &'static str,
        /// Offset of the failing page
        offset: usize,
        /// First identifier position in the failing page (1-based)
        start: usize,
        /// Last identifier position in the failing page (inclusive)
        end: usize,
        /// Upstream HTTP status, when there was one
        status: Option<u16>,
        /// Underlying error from the last attempt
        #[source]
        source: Box<PubmedError>,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Input validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl PubmedError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PubmedError::Upstream { status, .. } => Some(*status),
            PubmedError::RateLimited(_) => Some(429),
            PubmedError::Network(e) => e.status().map(|s| s.as_u16()),
            PubmedError::BatchFetch { status, .. } => *status,
            _ => None,
        }
    }

    /// 5xx-class upstream failure.
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }

    /// Failure that may succeed when repeated: transport errors,
    /// rate limiting and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            PubmedError::Network(_) | PubmedError::RateLimited(_) => true,
            _ => self.is_server_error(),
        }
    }
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "n/a".to_string(), |s| s.to_string())
}

/// Result type alias using `PubmedError`
pub type Result<T> = std::result::Result<T, PubmedError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| PubmedError::Parse(msg.to_string()))
    }
}
