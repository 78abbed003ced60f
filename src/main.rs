//! rustpubmed - PubMed publication retrieval for a researcher table
//!
//! ## Usage
//!
//! ### Full run
//! ```bash
//! rustpubmed run --identities researchers.csv --output ./Reports
//! ```
//!
//! ### Inspect the search terms without network access
//! ```bash
//! rustpubmed terms --identities researchers.csv
//! rustpubmed variations Smith-Jones Mary --middle Ann
//! ```

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use rustpubmed::{
    config::{default_settings_path, ClientConfig, Settings},
    entrez::EntrezClient,
    grants::GrantVariants,
    input,
    pipeline::{plan_terms, Pipeline},
    record::ParsePolicy,
    report,
    terms::name_variations,
};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// PubMed publication retrieval for a table of researchers
#[derive(Parser)]
#[command(name = "rustpubmed")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search PubMed for every identity and write the reports
    Run {
        /// Identity table (lname, fname, mname, affiliation, start, end, orcid)
        #[arg(short, long)]
        identities: PathBuf,

        /// Settings file (defaults to <config_dir>/rustpubmed/settings.json)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "./Reports")]
        output: PathBuf,

        /// NCBI API key (overrides the settings file)
        #[arg(long, env = "NCBI_API_KEY")]
        api_key: Option<String>,

        /// Contact email sent to NCBI (overrides the settings file)
        #[arg(long, env = "NCBI_EMAIL")]
        email: Option<String>,

        /// Records fetched per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Write "unknown" for unreadable publication dates instead of failing
        #[arg(long)]
        lenient_dates: bool,
    },

    /// Print every search term for an identity table
    Terms {
        /// Identity table
        #[arg(short, long)]
        identities: PathBuf,
    },

    /// Print the name variations for one researcher
    Variations {
        /// Last name
        last: String,

        /// First name
        first: String,

        /// Middle name
        #[arg(long, default_value = "")]
        middle: String,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Run {
            identities,
            settings,
            output,
            api_key,
            email,
            batch_size,
            lenient_dates,
        } => {
            let options = RunOptions {
                identities,
                settings,
                output,
                api_key,
                email,
                batch_size,
                lenient_dates,
            };
            run_pipeline(options).await.inspect_err(|e| error!(error = %e, "Run failed"))
        }
        Commands::Terms { identities } => print_terms(&identities),
        Commands::Variations {
            last,
            first,
            middle,
        } => {
            for variation in name_variations(&last, &first, &middle) {
                println!("{}", variation);
            }
            Ok(())
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

struct RunOptions {
    identities: PathBuf,
    settings: Option<PathBuf>,
    output: PathBuf,
    api_key: Option<String>,
    email: Option<String>,
    batch_size: Option<usize>,
    lenient_dates: bool,
}

/// Settings from the given path, or the default path when it exists.
fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = default_settings_path()?;
            if !default.exists() {
                warn!(path = %default.display(), "No settings file; running without grant variants");
                return Ok(Settings::default());
            }
            default
        }
    };
    Settings::load(&path).with_context(|| format!("Failed to load settings from {}", path.display()))
}

async fn run_pipeline(options: RunOptions) -> Result<()> {
    let mut settings = load_settings(options.settings.as_deref())?;
    if options.api_key.is_some() {
        settings.api_key = options.api_key;
    }
    if options.email.is_some() {
        settings.email = options.email;
    }
    let (settings, _) = settings.validate();

    let rows = input::load_identities(&options.identities)
        .with_context(|| format!("Failed to read identities from {}", options.identities.display()))?;
    let (identities, _) = input::validate_identities(rows).context("Invalid identity table")?;

    let mut config = ClientConfig::from_settings(&settings);
    if let Some(size) = options.batch_size {
        config.batch_size = size;
    }
    let grants = GrantVariants::new(settings.grants.iter().cloned());
    let policy = if options.lenient_dates {
        ParsePolicy::Lenient
    } else {
        ParsePolicy::Strict
    };

    info!(
        identities = identities.len(),
        grants = grants.len(),
        authenticated = config.api_key.is_some(),
        batch_size = config.batch_size,
        "Starting run"
    );

    let client = EntrezClient::new(config.clone())?;
    let output = Pipeline::new(&client, &config, &grants)
        .with_policy(policy)
        .run(&identities)
        .await?;

    let folder = report::run_folder(&options.output, Local::now());
    let written = report::write_reports(&folder, &output).context("Failed to write reports")?;

    println!("Output folder: {}", folder.display());
    println!(
        "{} records from {} terms ({} files written)",
        output.records.len(),
        output.resolutions.len(),
        written.len()
    );
    Ok(())
}

fn print_terms(path: &Path) -> Result<()> {
    let rows = input::load_identities(path)
        .with_context(|| format!("Failed to read identities from {}", path.display()))?;
    let (identities, _) = input::validate_identities(rows).context("Invalid identity table")?;

    for planned in plan_terms(&identities)? {
        println!("{}\t{}\t{}", planned.display_name, planned.origin.label(), planned.term);
    }
    Ok(())
}
