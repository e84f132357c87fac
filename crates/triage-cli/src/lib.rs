//! backlog-triage command-line front end.
//!
//! - `cli`: argument parsing with clap
//! - `commands`: settings, organizer setup and command dispatch

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{load_settings, open_organizer, read_tickets, run};
