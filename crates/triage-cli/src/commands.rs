//! Command implementations for backlog-triage.
//!
//! Results go to stdout as JSON; logs go to stderr.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use triage_embeddings::load_model;
use triage_orchestrator::{Organizer, ReprocessOptions};
use triage_storage::Storage;
use triage_types::{Settings, Ticket};

use crate::cli::{Cli, Commands};

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(db_path) = &cli.db_path {
        settings.db_path = db_path.clone();
    }
    if let Some(log_level) = &cli.log_level {
        settings.log_level = log_level.clone();
    }
    Ok(settings)
}

fn init_logging(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Open storage, load the embedding model and build the organizer.
pub fn open_organizer(settings: &Settings) -> Result<Organizer> {
    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    info!(path = ?db_path, "Opening storage");
    let storage = Arc::new(Storage::open(&db_path).context("Failed to open storage")?);

    let model = load_model(&settings.organizer.model).context("Failed to load embedding model")?;
    let organizer = Organizer::new(settings.organizer.clone(), storage, Arc::from(model))
        .context("Invalid organizer configuration")?;
    Ok(organizer)
}

/// Parse one ticket per non-blank line.
pub fn read_tickets(reader: impl BufRead) -> Result<Vec<Ticket>> {
    let mut tickets = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let ticket: Ticket = serde_json::from_str(&line)
            .with_context(|| format!("Invalid ticket on line {}", n + 1))?;
        tickets.push(ticket);
    }
    Ok(tickets)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// Cancelled on Ctrl+C so a long reprocess can stop cleanly.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling");
            child.cancel();
        }
    });
    token
}

/// Run the parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    init_logging(&settings.log_level)?;
    let organizer = open_organizer(&settings)?;

    match cli.command {
        Commands::Process { input } => {
            let tickets = match input {
                Some(path) => {
                    let file = File::open(&path).with_context(|| format!("Cannot open {path}"))?;
                    read_tickets(BufReader::new(file))?
                }
                None => read_tickets(io::stdin().lock())?,
            };
            info!(tickets = tickets.len(), "Processing tickets");
            let report = organizer.process_batch(tickets).await;
            print_json(&report)?;
            if report.failed() > 0 {
                warn!(failed = report.failed(), "Some tickets failed");
            }
        }
        Commands::Similar {
            project,
            ticket,
            k,
            min_score,
        } => {
            print_json(&organizer.find_similar(&project, &ticket, k, min_score)?)?;
        }
        Commands::SimilarText {
            project,
            text,
            k,
            min_score,
        } => {
            let neighbors = organizer
                .find_similar_text(&project, &text, k, min_score)
                .await?;
            print_json(&neighbors)?;
        }
        Commands::Tags { project, ticket } => {
            print_json(&organizer.infer_tags(&project, &ticket)?)?;
        }
        Commands::Reprocess {
            project,
            timeout_secs,
        } => {
            let mut options = ReprocessOptions::default().with_cancel(cancel_on_ctrl_c());
            if let Some(secs) = timeout_secs {
                options = options.with_deadline(Duration::from_secs(secs));
            }
            print_json(&organizer.reprocess_project(&project, options).await?)?;
        }
        Commands::Delete { project, ticket } => {
            let deleted = organizer.delete_ticket(&project, &ticket).await?;
            print_json(&serde_json::json!({ "ticket_id": ticket, "deleted": deleted }))?;
        }
        Commands::Themes { project } => {
            print_json(&organizer.themes(&project)?)?;
        }
        Commands::Stats { project } => {
            print_json(&organizer.project_stats(&project)?)?;
        }
    }

    Ok(())
}
