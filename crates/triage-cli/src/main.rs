//! Backlog Triage
//!
//! Links similar tickets, groups them into themes and suggests labels.
//!
//! # Usage
//!
//! ```bash
//! backlog-triage process --input tickets.jsonl
//! backlog-triage similar PAY PAY-123 -k 5
//! backlog-triage reprocess PAY --timeout-secs 60
//! backlog-triage stats PAY
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/backlog-triage/config.toml)
//! 3. Environment variables (TRIAGE_*, nested keys joined with `__`)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use triage_cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    run(Cli::parse()).await
}
