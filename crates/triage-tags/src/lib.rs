//! # triage-tags
//!
//! Advisory labels for a ticket, combined from three signals:
//!
//! - **similar-ticket**: labels carried by enough of the nearest neighbors
//! - **theme**: labels common among the other members of the ticket's theme
//! - **content-rule**: configured patterns matched against title and body
//!
//! Labels are folded to a canonical form before voting, so `Bug`, `bug`
//! and a configured synonym all count as one. Labels the ticket already
//! carries are never suggested. The same neighbor list also drives the
//! parent epic and component suggestions.

pub mod canonical;
pub mod components;
pub mod epic;
pub mod error;
pub mod inferencer;
pub mod rules;

pub use canonical::Canonicalizer;
pub use components::suggest_components;
pub use epic::suggest_epic;
pub use error::TagError;
pub use inferencer::{combine_votes, Inference, LabelVote, TagInferencer};
pub use rules::RuleSet;
