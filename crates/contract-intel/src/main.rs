//! # Contract Intelligence CLI (`cintel`)
//!
//! ## Usage
//!
//! ```bash
//! cintel --config ./config/cintel.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cintel init` | Create the SQLite database and schema |
//! | `cintel ingest <paths…>` | Ingest PDF files or directories of PDFs |
//! | `cintel reindex <id>` | Re-segment and re-embed a stored document |
//! | `cintel search "<question>"` | Ranked passages with page citations |
//! | `cintel ask "<question>"` | Answer with citations |
//! | `cintel extract <id>` | Structured contract fields |
//! | `cintel audit <id>` | Risk findings with page-cited evidence |
//! | `cintel get <id>` | Document pages and passages |
//! | `cintel stats` | Index statistics |
//! | `cintel serve` | Start the HTTP API |
//! | `cintel completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! cintel init
//! cintel ingest ./contracts
//! cintel ask "What is the notice period for termination?" --doc 6f1c…
//! cintel audit 6f1c… --json
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use contract_intel::{analysis, ask, config, get, ingest, logging, migrate, server, stats};

/// Contract Intelligence: ingest PDF contracts, answer questions with
/// page-accurate citations, extract fields and audit risky clauses.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cintel.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cintel",
    about = "Contract Intelligence: cited question answering over PDF contracts",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/cintel.toml`.
    #[arg(long, global = true, default_value = "./config/cintel.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents, pages, passages
    /// and passage_vectors tables. Safe to run repeatedly.
    Init,

    /// Ingest PDF contracts.
    ///
    /// Directories are walked recursively for `.pdf` files. Each file is
    /// stored under the upload directory, split into pages, segmented into
    /// overlapping passages and embedded.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Re-segment and re-embed a stored document with the current
    /// chunking parameters and embedding provider.
    Reindex {
        /// Document id.
        id: String,
    },

    /// Retrieve the passages most similar to a question.
    Search {
        question: String,

        /// Restrict to a document (repeatable).
        #[arg(long = "doc")]
        documents: Vec<String>,

        /// Number of passages (defaults to `[retrieval] top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Answer a question from the ingested contracts, with citations.
    Ask {
        question: String,

        /// Restrict to a document (repeatable).
        #[arg(long = "doc")]
        documents: Vec<String>,

        #[arg(long)]
        top_k: Option<usize>,

        /// Print the response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract structured fields (parties, dates, terms, liability cap…).
    Extract {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Audit a contract for risky clauses.
    Audit {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Show a document's pages and passages.
    Get {
        id: String,

        /// Also print the full extracted text.
        #[arg(long)]
        text: bool,
    },

    /// Show index statistics.
    Stats,

    /// Start the HTTP API on `[server] bind`.
    Serve,

    /// Print shell completions to stdout.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "cintel", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { paths } => {
            ingest::run_ingest(&cfg, &paths).await?;
        }
        Commands::Reindex { id } => {
            ingest::run_reindex(&cfg, &id).await?;
        }
        Commands::Search {
            question,
            documents,
            top_k,
        } => {
            ask::run_search(&cfg, &question, &documents, top_k).await?;
        }
        Commands::Ask {
            question,
            documents,
            top_k,
            json,
        } => {
            ask::run_ask(&cfg, &question, &documents, top_k, json).await?;
        }
        Commands::Extract { id, json } => {
            analysis::run_extract(&cfg, &id, json).await?;
        }
        Commands::Audit { id, json } => {
            analysis::run_audit(&cfg, &id, json).await?;
        }
        Commands::Get { id, text } => {
            get::run_get(&cfg, &id, text).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}
