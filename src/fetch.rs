//! Batch record retrieval.
//!
//! The unified id set is submitted once to obtain a history session, then
//! fetched in fixed-size pages. Each page is retried on 5xx responses only;
//! a page that still fails aborts the run with its position so an operator
//! can tell how far the fetch got.

use crate::config::ClientConfig;
use crate::entrez::{EntrezApi, HistorySession};
use crate::error::{PubmedError, Result};
use tracing::{info, warn};

/// Opening tag of one record
pub const RECORD_MARKER: &str = "<PubmedArticle>";

const RECORD_END: &str = "</PubmedArticle>";

/// Retrieves full records for an id set
pub struct BatchFetcher<'a, A: EntrezApi + ?Sized> {
    api: &'a A,
    config: &'a ClientConfig,
}

impl<'a, A: EntrezApi + ?Sized> BatchFetcher<'a, A> {
    pub fn new(api: &'a A, config: &'a ClientConfig) -> Self {
        Self { api, config }
    }

    /// Fetch every id, returning the pages concatenated in offset order.
    ///
    /// An empty id set makes no remote calls.
    pub async fn fetch_all(&self, ids: &[String]) -> Result<String> {
        if ids.is_empty() {
            info!("No ids to fetch");
            return Ok(String::new());
        }

        let total = ids.len();
        let session = self.submit(ids).await?;
        let batch_size = self.config.batch_size.max(1);
        let pages = total.div_ceil(batch_size);
        let mut combined = String::new();

        for (page, offset) in (0..total).step_by(batch_size).enumerate() {
            let end = (offset + batch_size).min(total);
            info!(
                page = page + 1,
                pages = pages,
                start = offset + 1,
                end = end,
                total = total,
                "Fetching records"
            );

            let text = self
                .config
                .fetch_retry
                .run("efetch", || self.api.fetch_page(&session, offset, batch_size))
                .await
                .map_err(|e| {
                    warn!(offset = offset, start = offset + 1, end = end, error = %e, "Batch fetch failed");
                    PubmedError::BatchFetch {
                        stage: "fetch",
                        offset,
                        start: offset + 1,
                        end,
                        status: e.status(),
                        source: Box::new(e),
                    }
                })?;
            combined.push_str(&text);
        }

        Ok(combined)
    }

    async fn submit(&self, ids: &[String]) -> Result<HistorySession> {
        info!(count = ids.len(), "Submitting id set");
        self.config
            .fetch_retry
            .run("epost", || self.api.post_ids(ids))
            .await
            .map_err(|e| PubmedError::BatchFetch {
                stage: "submit",
                offset: 0,
                start: 1,
                end: ids.len(),
                status: e.status(),
                source: Box::new(e),
            })
    }
}

/// Split concatenated fetch output into one text per record.
///
/// Text before the first marker (XML declarations, set wrappers) is dropped,
/// and each record is cut after its closing tag so page wrappers between
/// records never leak into a record.
pub fn split_records(blob: &str) -> Vec<String> {
    blob.split(RECORD_MARKER)
        .skip(1)
        .map(|piece| {
            let body = match piece.find(RECORD_END) {
                Some(pos) => &piece[..pos + RECORD_END.len()],
                None => piece,
            };
            format!("{}{}", RECORD_MARKER, body)
        })
        .collect()
}
