//! # rustpubmed
//!
//! PubMed publication retrieval for a table of researchers.
//!
//! ## Modules
//!
//! - [`terms`] - Name variations and search-term construction
//! - [`search`] - Term resolution with retry
//! - [`fetch`] - Two-phase batched record retrieval
//! - [`record`] - Record parsing and grant tag matching
//! - [`provenance`] - Which query found which record
//! - [`pipeline`] - End-to-end orchestration
//! - [`entrez`] - E-utilities client
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustpubmed::{config::ClientConfig, entrez::EntrezClient, grants::GrantVariants};
//! use rustpubmed::{input, pipeline::Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let identities = input::load_identities(std::path::Path::new("identities.csv"))?;
//!     let config = ClientConfig::default();
//!     let client = EntrezClient::new(config.clone())?;
//!     let grants = GrantVariants::new(["R01CA123456"]);
//!     let output = Pipeline::new(&client, &config, &grants).run(&identities).await?;
//!     println!("Found {} records", output.records.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entrez;
pub mod error;
pub mod fetch;
pub mod grants;
pub mod input;
pub mod pipeline;
pub mod provenance;
pub mod pubdate;
pub mod record;
pub mod report;
pub mod retry;
pub mod search;
pub mod terms;
pub mod xml;

pub use error::{PubmedError, Result};
