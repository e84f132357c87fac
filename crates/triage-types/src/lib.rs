//! # triage-types
//!
//! Shared domain types for the backlog-triage engine.
//!
//! - [`Ticket`]: the record handed to the engine by the tracker integration
//! - [`OrganizationResult`] and friends: what the engine hands back
//! - [`OrganizerConfig`]: the immutable, validated knobs for one organizer
//! - [`Settings`]: layered process settings used by the CLI

pub mod config;
pub mod error;
pub mod result;
pub mod ticket;

pub use config::{
    BatchConfig, ContentRule, ModelConfig, OrganizerConfig, Settings, SimilarityConfig,
    TagConfig, TagWeights, ThemeConfig, MAX_K,
};
pub use error::TriageError;
pub use result::{
    BatchItem, BatchOutcome, BatchReport, ComponentSuggestion, EpicSuggestion, ErrorClass, OrganizationResult,
    ProjectStats, SimilarityLink, TagSource, TagSuggestion, ThemeAssignment,
};
pub use ticket::Ticket;
