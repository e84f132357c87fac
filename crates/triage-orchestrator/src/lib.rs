//! # triage-orchestrator
//!
//! Runs tickets through the organization pipeline:
//!
//! 1. Compose and clean the ticket text, then embed it (off the async
//!    runtime, retried on transient failures)
//! 2. Store the vector and ticket doc in one atomic write
//! 3. Join or seed a theme incrementally
//! 4. Collect similar tickets, tag suggestions and an epic suggestion
//!
//! Batches embed in bounded parallel chunks, apply every ticket under the
//! project lock, then run a single full theme reprocess before reporting.
//! Failures are isolated per ticket and classified in the batch report.

pub mod context;
pub mod error;
pub mod organizer;
pub mod retry;

pub use context::ProjectContext;
pub use error::OrganizerError;
pub use organizer::Organizer;
pub use retry::RetryPolicy;
pub use triage_themes::{ReprocessOptions, ReprocessSummary};
