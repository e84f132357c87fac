//! CLI argument parsing for backlog-triage.
//!
//! Flags given here override the config file and environment.

use clap::{Parser, Subcommand};

/// Backlog Triage
///
/// Links, groups and labels issue-tracker tickets by meaning.
#[derive(Parser, Debug)]
#[command(name = "backlog-triage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/backlog-triage/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Organize tickets read as JSON lines and print the batch report
    Process {
        /// JSONL file with one ticket per line (default: stdin)
        #[arg(short, long)]
        input: Option<String>,
    },

    /// List tickets similar to a stored ticket
    Similar {
        project: String,
        ticket: String,

        /// Maximum results (capped at 20)
        #[arg(short, long)]
        k: Option<usize>,

        /// Minimum cosine similarity
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// List stored tickets similar to free text, without storing it
    SimilarText {
        project: String,
        text: String,

        /// Maximum results (capped at 20)
        #[arg(short, long)]
        k: Option<usize>,

        /// Minimum cosine similarity
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// Suggest labels for a stored ticket
    Tags { project: String, ticket: String },

    /// Rebuild every theme of a project from stored vectors
    Reprocess {
        project: String,

        /// Give up after this many seconds, keeping the previous themes
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Remove a ticket and everything derived from it
    Delete { project: String, ticket: String },

    /// List a project's themes
    Themes { project: String },

    /// Show stored counts for a project
    Stats { project: String },
}
